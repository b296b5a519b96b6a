//! Loan statistics.

use anyhow::Result;
use comfy_table::{ContentArrangement, Table};
use libradmin_core::routes::Route;
use libradmin_types::DashboardSummary;

use crate::cli::App;

pub async fn show(app: &App) -> Result<()> {
    let view = app.enter(Route::Dashboard).await?;
    let token = app.session.token();
    let summary = app
        .api
        .dashboard(token.as_deref())
        .await
        .map_err(|e| app.report(e))?;

    println!("Hola, {}", view.user.short_name());
    print!("{}", render(&summary));

    let unseen = view.overdue.unseen_count();
    if unseen > 0 {
        println!("{unseen} overdue loans not seen yet (libradmin overdue list)");
    }
    Ok(())
}

fn render(summary: &DashboardSummary) -> String {
    let mut out = String::new();

    let mut totals = new_table(vec!["Préstamos", "Libros", "Estudiantes", "Usuarios"]);
    totals.add_row(vec![
        summary.total_loans.to_string(),
        summary.total_books.to_string(),
        summary.total_students.to_string(),
        summary.total_users.to_string(),
    ]);
    out.push_str(&format!("{totals}\n"));

    if !summary.loans_per_day.is_empty() {
        let mut table = new_table(vec!["Día", "Préstamos"]);
        for row in &summary.loans_per_day {
            table.add_row(vec![row.day.clone(), row.loans.to_string()]);
        }
        out.push_str(&format!("{table}\n"));
    }

    if !summary.loans_per_month.is_empty() {
        let mut table = new_table(vec!["Mes", "Total"]);
        for row in &summary.loans_per_month {
            table.add_row(vec![row.month.clone(), row.total.to_string()]);
        }
        out.push_str(&format!("{table}\n"));
    }

    if !summary.top_loaned_books.is_empty() {
        let mut table = new_table(vec!["Libro más prestado", "Total"]);
        for row in &summary.top_loaned_books {
            table.add_row(vec![row.book.clone(), row.total.to_string()]);
        }
        out.push_str(&format!("{table}\n"));
    }

    out
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header);
    table
}

#[cfg(test)]
mod tests {
    use libradmin_types::{LoansPerDay, TopLoanedBook};

    use super::*;

    #[test]
    fn test_render_skips_empty_series() {
        let summary = DashboardSummary {
            total_loans: 12,
            total_books: 40,
            total_students: 9,
            total_users: 2,
            loans_per_day: vec![LoansPerDay {
                day: "Lunes".into(),
                loans: 3,
            }],
            loans_per_month: Vec::new(),
            top_loaned_books: vec![TopLoanedBook {
                book: "Rayuela".into(),
                total: 5,
            }],
        };

        let out = render(&summary);
        assert!(out.contains("Estudiantes"));
        assert!(out.contains("Lunes"));
        assert!(out.contains("Rayuela"));
        assert!(!out.contains("Mes"));
    }
}
