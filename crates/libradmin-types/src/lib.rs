//! Wire types shared by the libradmin client and console.
//!
//! Field names follow the JSON produced by the library API (Spanish keys);
//! Rust names are the English equivalents.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Role of an account in the admin console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "Administrador")]
    Administrator,
    #[serde(rename = "Asistente")]
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Administrator => write!(f, "Administrador"),
            Role::Assistant => write!(f, "Asistente"),
        }
    }
}

/// Profile of the signed-in user, as returned by `/auth/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: i64,
    #[serde(rename = "usuario")]
    pub username: String,
    #[serde(rename = "nombres")]
    pub first_names: String,
    #[serde(rename = "apellidos")]
    pub last_names: String,
    #[serde(rename = "correo")]
    pub email: String,
    #[serde(rename = "rol")]
    pub role: Role,
}

impl AuthUser {
    /// First given name plus first surname, as shown in the navbar.
    pub fn short_name(&self) -> String {
        let first = self.first_names.split_whitespace().next().unwrap_or("");
        let last = self.last_names.split_whitespace().next().unwrap_or("");
        format!("{first} {last}").trim().to_string()
    }
}

/// Body of `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginCredentials {
    #[serde(rename = "usuario")]
    pub username: String,
    #[serde(rename = "contraseña")]
    pub password: String,
}

/// Payload inside the `data` field of a successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginData {
    pub token: String,
    pub user: AuthUser,
}

/// Standard `{data, message}` envelope used by the auth endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Body-less acknowledgment: `{message}`, `{mensaje}`, or both.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mensaje: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiMessage {
    /// First non-empty of `mensaje` and `message`.
    pub fn text(&self) -> Option<&str> {
        self.mensaje
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.message.as_deref().filter(|s| !s.is_empty()))
    }
}

/// Error body returned by the API on rejected requests.
///
/// Both `mensaje` and `message` are seen in the wild; `mensaje` wins.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub mensaje: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiErrorBody {
    pub fn text(&self) -> Option<&str> {
        self.mensaje
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.message.as_deref().filter(|s| !s.is_empty()))
    }
}

/// Body of `POST /auth/link-reset-password`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetLink {
    #[serde(rename = "correo")]
    pub email: String,
}

/// Body of `POST /auth/reset-password`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordReset {
    pub email: String,
    pub password: String,
}

/// An overdue loan, one per (student, loan) pair from `/library/loan/overdue`.
///
/// `seen` is client-only: the server never sends it, so it defaults to false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverdueLoan {
    #[serde(rename = "idEstudiante")]
    pub student_id: i64,
    #[serde(rename = "idLibro")]
    pub book_id: i64,
    #[serde(rename = "nombresEstudiante")]
    pub student_first_names: String,
    #[serde(rename = "apellidosEstudiante")]
    pub student_last_names: String,
    #[serde(rename = "correoEstudiante")]
    pub student_email: String,
    #[serde(rename = "fechaPrestamo")]
    pub loan_date: String,
    #[serde(rename = "fechaDevolucion")]
    pub due_date: String,
    #[serde(rename = "visto", alias = "seen", default)]
    pub seen: bool,
}

impl OverdueLoan {
    pub fn student_short_name(&self) -> String {
        let first = self
            .student_first_names
            .split_whitespace()
            .next()
            .unwrap_or("");
        let last = self
            .student_last_names
            .split_whitespace()
            .next()
            .unwrap_or("");
        format!("{first} {last}").trim().to_string()
    }
}

/// Body of `POST /library/loan/overdue`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverdueNotice {
    #[serde(rename = "correo")]
    pub email: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoansPerDay {
    #[serde(rename = "dia")]
    pub day: String,
    #[serde(rename = "prestamos")]
    pub loans: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoansPerMonth {
    #[serde(rename = "mes")]
    pub month: String,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopLoanedBook {
    #[serde(rename = "libro")]
    pub book: String,
    pub total: u64,
}

/// Aggregates served by `GET /library/dashboard`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    #[serde(rename = "totalPrestamos")]
    pub total_loans: u64,
    #[serde(rename = "totalLibros")]
    pub total_books: u64,
    #[serde(rename = "totalEstudiantes")]
    pub total_students: u64,
    #[serde(rename = "totalUsuarios")]
    pub total_users: u64,
    #[serde(rename = "cantidadPrestamosPorDia", default)]
    pub loans_per_day: Vec<LoansPerDay>,
    #[serde(rename = "cantidadPrestamosPorMes", default)]
    pub loans_per_month: Vec<LoansPerMonth>,
    #[serde(rename = "top5LibrosMasPrestados", default)]
    pub top_loaned_books: Vec<TopLoanedBook>,
}

/// Entities exposed under `/library/{entity}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Author,
    Subject,
    Book,
    Student,
    User,
    Loan,
}

impl Entity {
    pub const ALL: [Entity; 6] = [
        Entity::Author,
        Entity::Subject,
        Entity::Book,
        Entity::Student,
        Entity::User,
        Entity::Loan,
    ];

    /// Path segment used by the API.
    pub fn segment(self) -> &'static str {
        match self {
            Entity::Author => "author",
            Entity::Subject => "subject",
            Entity::Book => "book",
            Entity::Student => "student",
            Entity::User => "user",
            Entity::Loan => "loan",
        }
    }

    pub fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|entity| entity.segment().eq_ignore_ascii_case(segment.trim()))
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}
