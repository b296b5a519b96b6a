//! Overdue-loan notifications.
//!
//! The server knows which loans are overdue; only this client knows which
//! of them the operator has already seen. [`OverdueReconciler`] merges the
//! two on every fetch and keeps the merged list under `loansOverdue` in
//! local storage.

use std::sync::{Arc, Mutex};

use libradmin_types::{OverdueLoan, OverdueNotice};
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::error::{ClientError, ClientResult};
use crate::notify::{Notice, Notifier};
use crate::session::SessionManager;
use crate::storage::LocalStorage;
use crate::validation::{self, FieldError};

pub const OVERDUE_KEY: &str = "loansOverdue";

const SENDING: &str = "Enviando...";
const NOTICE_SENT: &str = "Mensaje enviado";
const UNKNOWN_STUDENT: &str = "El estudiante no tiene préstamos vencidos";

/// Merges a fresh server list with the previously stored one.
///
/// One record survives per student id: the last one the server sent for
/// that student, at the position where the student first appears. `seen`
/// is carried forward from the prior record with the same student id and
/// defaults to false.
pub fn merge_seen(prior: &[OverdueLoan], fresh: Vec<OverdueLoan>) -> Vec<OverdueLoan> {
    let mut merged: Vec<OverdueLoan> = Vec::with_capacity(fresh.len());
    for loan in fresh {
        match merged.iter_mut().find(|m| m.student_id == loan.student_id) {
            Some(slot) => *slot = loan,
            None => merged.push(loan),
        }
    }

    for loan in &mut merged {
        // Last prior entry wins, matching a keyed lookup built in order.
        loan.seen = prior
            .iter()
            .rev()
            .find(|p| p.student_id == loan.student_id)
            .is_some_and(|p| p.seen);
    }
    merged
}

pub struct OverdueReconciler {
    api: ApiClient,
    storage: LocalStorage,
    session: Arc<SessionManager>,
    notifier: Arc<dyn Notifier>,
    records: Mutex<Vec<OverdueLoan>>,
}

impl OverdueReconciler {
    /// Starts from the persisted list so the unseen count is available
    /// before the first fetch.
    pub fn new(
        api: ApiClient,
        storage: LocalStorage,
        session: Arc<SessionManager>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let reconciler = Self {
            api,
            storage,
            session,
            notifier,
            records: Mutex::new(Vec::new()),
        };
        let stored = reconciler.load_stored();
        reconciler.replace(stored);
        reconciler
    }

    pub fn records(&self) -> Vec<OverdueLoan> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn unseen(&self) -> Vec<OverdueLoan> {
        self.records().into_iter().filter(|r| !r.seen).collect()
    }

    pub fn unseen_count(&self) -> usize {
        self.records
            .lock()
            .map(|r| r.iter().filter(|l| !l.seen).count())
            .unwrap_or_default()
    }

    /// Fetches the current overdue list and reconciles it with the stored
    /// seen flags.
    ///
    /// Returns `None` when the request failed; the failure has been
    /// surfaced and held state is untouched.
    pub async fn fetch_overdue_loans(&self) -> Option<Vec<OverdueLoan>> {
        let token = self.session.token();
        let fresh = match self.api.overdue_loans(token.as_deref()).await {
            Ok(fresh) => fresh,
            Err(err) => {
                warn!(error = ?err, "fetching overdue loans failed");
                self.notifier.notify(Notice::error(err.user_message()));
                return None;
            }
        };

        let prior = self.load_stored();
        let merged = merge_seen(&prior, fresh);
        if let Err(err) = self.store(&merged) {
            warn!(error = ?err, "persisting overdue loans failed");
        }
        debug!(
            total = merged.len(),
            unseen = merged.iter().filter(|l| !l.seen).count(),
            "overdue loans reconciled"
        );
        self.replace(merged.clone());
        Some(merged)
    }

    /// Marks every held record seen. Local only.
    ///
    /// # Errors
    /// Returns an error if the list cannot be persisted; held state is then
    /// unchanged.
    pub fn mark_all_seen(&self) -> ClientResult<Vec<OverdueLoan>> {
        let mut records = self.records();
        for loan in &mut records {
            loan.seen = true;
        }
        self.store(&records)?;
        self.replace(records.clone());
        info!(count = records.len(), "all overdue loans marked seen");
        Ok(records)
    }

    /// E-mails one student about their overdue loan, marks the student seen
    /// and re-fetches.
    ///
    /// The inner `None` means the notice went out but the follow-up fetch
    /// failed.
    ///
    /// # Errors
    /// Returns a validation error, or the classified request failure (already
    /// surfaced). Seen flags are unchanged on error.
    pub async fn acknowledge_one(
        &self,
        student_id: i64,
        message: &str,
    ) -> ClientResult<Option<Vec<OverdueLoan>>> {
        validation::ensure_valid(validation::overdue_message(message))?;
        let Some(email) = self
            .records()
            .into_iter()
            .find(|l| l.student_id == student_id)
            .map(|l| l.student_email)
        else {
            return Err(ClientError::Validation(vec![FieldError::new(
                "idEstudiante",
                UNKNOWN_STUDENT,
            )]));
        };

        self.notifier.notify(Notice::loading(SENDING));
        let notice = OverdueNotice {
            email,
            message: message.trim().to_string(),
        };
        let token = self.session.token();
        let reply = match self.api.send_overdue_notice(token.as_deref(), &notice).await {
            Ok(reply) => reply,
            Err(err) => {
                self.notifier.notify(Notice::error(err.user_message()));
                return Err(err);
            }
        };
        info!(student_id, "overdue notice sent");
        self.notifier.notify(Notice::success(
            reply.text().unwrap_or(NOTICE_SENT).to_string(),
        ));

        self.mark_seen(student_id);
        Ok(self.fetch_overdue_loans().await)
    }

    fn mark_seen(&self, student_id: i64) {
        let mut records = self.records();
        for loan in records.iter_mut().filter(|l| l.student_id == student_id) {
            loan.seen = true;
        }
        if let Err(err) = self.store(&records) {
            warn!(student_id, error = ?err, "persisting seen flag failed");
        }
        self.replace(records);
    }

    fn replace(&self, records: Vec<OverdueLoan>) {
        if let Ok(mut held) = self.records.lock() {
            *held = records;
        }
    }

    fn load_stored(&self) -> Vec<OverdueLoan> {
        let raw = match self.storage.get_item(OVERDUE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(error = ?err, "local storage unreadable");
                return Vec::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|err| {
            warn!(error = %err, "ignoring unreadable stored overdue loans");
            Vec::new()
        })
    }

    fn store(&self, records: &[OverdueLoan]) -> ClientResult<()> {
        let raw = serde_json::to_string(records)
            .map_err(|err| ClientError::internal(format!("serialize overdue loans: {err}")))?;
        if let Err(err) = self.storage.set_item(OVERDUE_KEY, &raw) {
            // An unparseable store would reject every later write too.
            warn!(error = ?err, "local storage unwritable; clearing it");
            self.storage.clear()?;
            self.storage.set_item(OVERDUE_KEY, &raw)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};
    use tempfile::{TempDir, tempdir};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::error::GENERIC_ERROR_MESSAGE;
    use crate::notify::{NoticeLevel, NoticeLog};
    use crate::routes::{NavigationLog, Navigator};
    use crate::session::TOKEN_COOKIE;
    use crate::storage::{CookieJar, CookieOptions};

    struct Harness {
        reconciler: OverdueReconciler,
        storage: LocalStorage,
        notices: Arc<NoticeLog>,
        _dir: TempDir,
    }

    fn harness(base_url: &str) -> Harness {
        let dir = tempdir().unwrap();
        let jar = CookieJar::new(dir.path().join("cookies.json"));
        jar.set(TOKEN_COOKIE, "tok-1", CookieOptions::session_day())
            .unwrap();
        let storage = LocalStorage::new(dir.path().join("local_storage.json"));
        let notices = Arc::new(NoticeLog::new());
        let api = ApiClient::new(base_url, None).unwrap();
        let session = Arc::new(SessionManager::new(
            api.clone(),
            jar,
            Arc::new(NavigationLog::new()) as Arc<dyn Navigator>,
            Arc::clone(&notices) as Arc<dyn Notifier>,
        ));
        let reconciler = OverdueReconciler::new(
            api,
            storage.clone(),
            session,
            Arc::clone(&notices) as Arc<dyn Notifier>,
        );
        Harness {
            reconciler,
            storage,
            notices,
            _dir: dir,
        }
    }

    fn loan(student_id: i64, book_id: i64, seen: bool) -> OverdueLoan {
        OverdueLoan {
            student_id,
            book_id,
            student_first_names: format!("Nombre{student_id}"),
            student_last_names: "Apellido".into(),
            student_email: format!("s{student_id}@example.com"),
            loan_date: "2026-09-01".into(),
            due_date: "2026-09-15".into(),
            seen,
        }
    }

    fn wire(student_id: i64) -> Value {
        json!({
            "idEstudiante": student_id,
            "idLibro": 100 + student_id,
            "nombresEstudiante": format!("Nombre{student_id}"),
            "apellidosEstudiante": "Apellido",
            "correoEstudiante": format!("s{student_id}@example.com"),
            "fechaPrestamo": "2026-09-01",
            "fechaDevolucion": "2026-09-15"
        })
    }

    fn stored(storage: &LocalStorage) -> Vec<OverdueLoan> {
        serde_json::from_str(&storage.get_item(OVERDUE_KEY).unwrap().unwrap()).unwrap()
    }

    fn seen_flags(loans: &[OverdueLoan]) -> Vec<(i64, bool)> {
        loans.iter().map(|l| (l.student_id, l.seen)).collect()
    }

    async fn serve_overdue(server: &MockServer, body: Value) {
        Mock::given(method("GET"))
            .and(path("/library/loan/overdue"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[test]
    fn test_merge_carries_seen_forward() {
        let prior = vec![loan(7, 1, true)];
        let merged = merge_seen(&prior, vec![loan(7, 1, false), loan(9, 2, false)]);
        assert_eq!(seen_flags(&merged), vec![(7, true), (9, false)]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let fresh = vec![loan(1, 1, false), loan(2, 2, false)];
        let prior = vec![loan(1, 1, true)];
        let once = merge_seen(&prior, fresh.clone());
        let twice = merge_seen(&once, fresh);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_collapses_per_student() {
        let merged = merge_seen(&[], vec![loan(1, 10, false), loan(2, 20, false), loan(1, 11, false)]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].student_id, 1);
        assert_eq!(merged[0].book_id, 11);
        assert_eq!(merged[1].student_id, 2);
    }

    #[test]
    fn test_new_starts_from_stored_list() {
        let h = harness("http://127.0.0.1:9");
        assert!(h.reconciler.records().is_empty());

        h.storage
            .set_item(
                OVERDUE_KEY,
                &serde_json::to_string(&[loan(1, 1, true), loan(2, 2, false)]).unwrap(),
            )
            .unwrap();
        let h2 = OverdueReconciler::new(
            ApiClient::new("http://127.0.0.1:9", None).unwrap(),
            h.storage.clone(),
            Arc::clone(&h.reconciler.session),
            Arc::clone(&h.notices) as Arc<dyn Notifier>,
        );
        assert_eq!(h2.unseen_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_merges_with_stored_history() {
        let server = MockServer::start().await;
        serve_overdue(&server, json!([wire(1), wire(2)])).await;

        let h = harness(&server.uri());
        h.storage
            .set_item(OVERDUE_KEY, &serde_json::to_string(&[loan(1, 101, true)]).unwrap())
            .unwrap();

        let merged = h.reconciler.fetch_overdue_loans().await.unwrap();
        assert_eq!(seen_flags(&merged), vec![(1, true), (2, false)]);
        assert_eq!(h.reconciler.unseen_count(), 1);
        assert_eq!(h.reconciler.unseen()[0].student_id, 2);
        assert_eq!(stored(&h.storage), merged);

        let again = h.reconciler.fetch_overdue_loans().await.unwrap();
        assert_eq!(again, merged);
    }

    #[tokio::test]
    async fn test_fetch_with_corrupt_history_starts_unseen() {
        let server = MockServer::start().await;
        serve_overdue(&server, json!([wire(1)])).await;

        let h = harness(&server.uri());
        h.storage.set_item(OVERDUE_KEY, "not json").unwrap();

        let merged = h.reconciler.fetch_overdue_loans().await.unwrap();
        assert_eq!(seen_flags(&merged), vec![(1, false)]);
    }

    #[tokio::test]
    async fn test_truncated_store_recovers_on_next_write() {
        let server = MockServer::start().await;
        serve_overdue(&server, json!([wire(1)])).await;

        let h = harness(&server.uri());
        std::fs::write(h.storage.path(), r#"{"loansOverdue": "[]""#).unwrap();

        let merged = h.reconciler.fetch_overdue_loans().await.unwrap();
        assert_eq!(seen_flags(&merged), vec![(1, false)]);
        assert_eq!(stored(&h.storage), merged);

        h.reconciler.mark_all_seen().unwrap();
        assert_eq!(seen_flags(&stored(&h.storage)), vec![(1, true)]);

        let later = OverdueReconciler::new(
            ApiClient::new(&server.uri(), None).unwrap(),
            h.storage.clone(),
            Arc::clone(&h.reconciler.session),
            Arc::clone(&h.notices) as Arc<dyn Notifier>,
        );
        let refetched = later.fetch_overdue_loans().await.unwrap();
        assert_eq!(seen_flags(&refetched), vec![(1, true)]);
    }

    #[tokio::test]
    async fn test_acknowledge_accepts_reply_with_both_message_keys() {
        let server = MockServer::start().await;
        serve_overdue(&server, json!([wire(1)])).await;
        Mock::given(method("POST"))
            .and(path("/library/loan/overdue"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "mensaje": "Correo enviado",
                "message": "Mail sent"
            })))
            .mount(&server)
            .await;

        let h = harness(&server.uri());
        h.reconciler.fetch_overdue_loans().await.unwrap();

        let refreshed = h
            .reconciler
            .acknowledge_one(1, "Por favor devuelve el libro")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seen_flags(&refreshed), vec![(1, true)]);
        assert_eq!(
            h.notices.messages(NoticeLevel::Success),
            vec!["Correo enviado".to_string()]
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_state() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/library/loan/overdue"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let h = harness(&server.uri());
        h.storage
            .set_item(OVERDUE_KEY, &serde_json::to_string(&[loan(1, 1, true)]).unwrap())
            .unwrap();
        let before = h.storage.get_item(OVERDUE_KEY).unwrap();

        let held = h.reconciler.records();
        assert!(h.reconciler.fetch_overdue_loans().await.is_none());
        assert_eq!(h.storage.get_item(OVERDUE_KEY).unwrap(), before);
        assert_eq!(h.reconciler.records(), held);
        assert_eq!(
            h.notices.messages(NoticeLevel::Error),
            vec![GENERIC_ERROR_MESSAGE.to_string()]
        );
    }

    #[tokio::test]
    async fn test_mark_all_seen_persists_same_list() {
        let server = MockServer::start().await;
        serve_overdue(&server, json!([wire(1), wire(2), wire(3)])).await;

        let h = harness(&server.uri());
        h.storage
            .set_item(OVERDUE_KEY, &serde_json::to_string(&[loan(1, 101, true)]).unwrap())
            .unwrap();
        h.reconciler.fetch_overdue_loans().await.unwrap();
        assert_eq!(h.reconciler.unseen_count(), 2);

        let all = h.reconciler.mark_all_seen().unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|l| l.seen));
        assert_eq!(h.reconciler.records(), all);
        assert_eq!(stored(&h.storage), all);
        assert_eq!(h.reconciler.unseen_count(), 0);
    }

    #[tokio::test]
    async fn test_acknowledge_marks_one_student() {
        let server = MockServer::start().await;
        serve_overdue(&server, json!([wire(1), wire(2)])).await;
        Mock::given(method("POST"))
            .and(path("/library/loan/overdue"))
            .and(body_json(json!({
                "correo": "s2@example.com",
                "message": "Por favor devuelve el libro"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Correo enviado"})))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server.uri());
        h.reconciler.fetch_overdue_loans().await.unwrap();

        let refreshed = h
            .reconciler
            .acknowledge_one(2, "  Por favor devuelve el libro ")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seen_flags(&refreshed), vec![(1, false), (2, true)]);
        assert_eq!(stored(&h.storage), refreshed);
        assert_eq!(
            h.notices.messages(NoticeLevel::Success),
            vec!["Correo enviado".to_string()]
        );
    }

    #[tokio::test]
    async fn test_acknowledge_failure_changes_nothing() {
        let server = MockServer::start().await;
        serve_overdue(&server, json!([wire(1)])).await;
        Mock::given(method("POST"))
            .and(path("/library/loan/overdue"))
            .respond_with(
                ResponseTemplate::new(422).set_body_json(json!({"mensaje": "Correo inválido"})),
            )
            .mount(&server)
            .await;

        let h = harness(&server.uri());
        h.reconciler.fetch_overdue_loans().await.unwrap();

        let err = h
            .reconciler
            .acknowledge_one(1, "Por favor devuelve el libro")
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Correo inválido");
        assert_eq!(h.reconciler.unseen_count(), 1);
        assert_eq!(seen_flags(&stored(&h.storage)), vec![(1, false)]);
    }

    #[tokio::test]
    async fn test_acknowledge_validates_before_sending() {
        let server = MockServer::start().await;
        serve_overdue(&server, json!([wire(1)])).await;
        Mock::given(method("POST"))
            .and(path("/library/loan/overdue"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let h = harness(&server.uri());
        h.reconciler.fetch_overdue_loans().await.unwrap();

        let short = h.reconciler.acknowledge_one(1, "hola").await.unwrap_err();
        assert_eq!(short.field_errors().len(), 1);

        let unknown = h
            .reconciler
            .acknowledge_one(42, "Por favor devuelve el libro")
            .await
            .unwrap_err();
        assert_eq!(unknown.field_errors()[0].field, "idEstudiante");
    }
}
