//! Overdue-loan notification commands.

use anyhow::{Context, Result};
use comfy_table::{ContentArrangement, Table};
use libradmin_core::routes::Route;
use libradmin_types::OverdueLoan;

use crate::cli::{App, Reported, surfaced};

pub async fn list(app: &App, unseen_only: bool, json: bool) -> Result<()> {
    let view = app.enter(Route::Loans).await?;
    if !view.reconciled {
        return Err(Reported.into());
    }
    let reconciler = view.overdue;
    let loans = reconciler.records();

    let shown: Vec<OverdueLoan> = loans
        .into_iter()
        .filter(|loan| !unseen_only || !loan.seen)
        .collect();

    if json {
        let out = serde_json::to_string_pretty(&shown).context("serialize overdue loans")?;
        println!("{out}");
        return Ok(());
    }

    if shown.is_empty() {
        println!("No overdue loans.");
    } else {
        println!("{}", table(&shown));
    }
    println!("{} unseen", reconciler.unseen_count());
    Ok(())
}

fn table(loans: &[OverdueLoan]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "", "Estudiante", "Nombre", "Correo", "Libro", "Préstamo", "Devolución",
    ]);
    for loan in loans {
        table.add_row(vec![
            if loan.seen { " " } else { "●" }.to_string(),
            loan.student_id.to_string(),
            loan.student_short_name(),
            loan.student_email.clone(),
            loan.book_id.to_string(),
            loan.loan_date.clone(),
            loan.due_date.clone(),
        ]);
    }
    table
}

pub async fn seen(app: &App) -> Result<()> {
    let view = app.enter(Route::Loans).await?;
    let marked = view.overdue.mark_all_seen().map_err(|e| app.report(e))?;
    println!("Marked {} overdue loans as seen.", marked.len());
    Ok(())
}

pub async fn notify(app: &App, student_id: i64, message: &str) -> Result<()> {
    let view = app.enter(Route::Loans).await?;
    let reconciler = view.overdue;
    // Without a fresh list only a stored record can identify the student.
    let known = reconciler
        .records()
        .iter()
        .any(|loan| loan.student_id == student_id);
    if !view.reconciled && !known {
        return Err(Reported.into());
    }

    let refreshed = reconciler
        .acknowledge_one(student_id, message)
        .await
        .map_err(surfaced)?;
    if refreshed.is_some() {
        println!("{} unseen", reconciler.unseen_count());
    }
    Ok(())
}
