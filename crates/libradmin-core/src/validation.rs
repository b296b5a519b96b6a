//! Client-side form validation.
//!
//! Values are trimmed before checking. Each field reports only its first
//! failing rule, so a blank value yields `Se requiere` rather than a length
//! complaint. Lengths are counted in characters, not bytes.

use std::fmt;
use std::sync::LazyLock;

use chrono::{Datelike, Local, NaiveDate};
use libradmin_types::{Entity, LoginCredentials};
use regex::Regex;
use serde_json::Value;

use crate::error::{ClientError, ClientResult};

pub const REQUIRED: &str = "Se requiere";
pub const INVALID_EMAIL: &str = "El correo no es válido";
pub const DIGITS_ONLY: &str = "Solo se permiten números";
pub const INVALID_DATE: &str = "Ingrese una fecha válida";
pub const PASSWORD_MISMATCH: &str = "Las contraseñas no coinciden";

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_'+\-.]*[A-Za-z0-9_+\-]@([A-Za-z0-9][A-Za-z0-9\-]*\.)+[A-Za-z]{2,}$")
        .expect("email pattern is valid")
});

/// A single failing field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Turns collected field errors into a submission gate.
///
/// # Errors
/// Returns `ClientError::Validation` when `errors` is not empty.
pub fn ensure_valid(errors: Vec<FieldError>) -> ClientResult<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ClientError::Validation(errors))
    }
}

/// Rule chain over one trimmed text field. Stops at the first failure.
struct Field<'a> {
    name: &'static str,
    value: &'a str,
    error: Option<String>,
}

impl<'a> Field<'a> {
    fn new(name: &'static str, raw: &'a str) -> Self {
        Self {
            name,
            value: raw.trim(),
            error: None,
        }
    }

    fn check(mut self, ok: impl FnOnce(&str) -> bool, message: impl Into<String>) -> Self {
        if self.error.is_none() && !ok(self.value) {
            self.error = Some(message.into());
        }
        self
    }

    fn required(self) -> Self {
        self.check(|v| !v.is_empty(), REQUIRED)
    }

    fn min(self, n: usize) -> Self {
        self.check(
            move |v| v.chars().count() >= n,
            format!("Mínimo {n} caracteres"),
        )
    }

    fn max(self, n: usize) -> Self {
        self.check(
            move |v| v.chars().count() <= n,
            format!("Máximo {n} caracteres"),
        )
    }

    fn len_between(self, min: usize, max: usize) -> Self {
        self.required().min(min).max(max)
    }

    fn email(self) -> Self {
        self.required().check(is_email, INVALID_EMAIL)
    }

    fn digits(self) -> Self {
        self.check(|v| v.chars().all(|c| c.is_ascii_digit()), DIGITS_ONLY)
    }

    fn finish(self, errors: &mut Vec<FieldError>) {
        if let Some(message) = self.error {
            errors.push(FieldError::new(self.name, message));
        }
    }
}

fn is_email(value: &str) -> bool {
    !value.starts_with('.') && !value.contains("..") && EMAIL_RE.is_match(value)
}

/// Optional status field: absent is fine, present-but-blank is not.
fn optional_status(name: &'static str, value: Option<&str>, errors: &mut Vec<FieldError>) {
    if let Some(v) = value
        && v.trim().is_empty()
    {
        errors.push(FieldError::new(name, REQUIRED));
    }
}

pub fn login(credentials: &LoginCredentials) -> Vec<FieldError> {
    let mut errors = Vec::new();
    Field::new("usuario", &credentials.username)
        .len_between(3, 10)
        .finish(&mut errors);
    Field::new("contraseña", &credentials.password)
        .len_between(6, 15)
        .finish(&mut errors);
    errors
}

pub fn email(value: &str) -> Vec<FieldError> {
    let mut errors = Vec::new();
    Field::new("correo", value).email().finish(&mut errors);
    errors
}

/// New password plus its confirmation.
#[derive(Debug, Clone, Default)]
pub struct ResetPasswordForm {
    pub password: String,
    pub confirm_password: String,
}

impl ResetPasswordForm {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        Field::new("contraseña", &self.password)
            .len_between(6, 15)
            .finish(&mut errors);
        Field::new("confirmContraseña", &self.confirm_password)
            .len_between(6, 15)
            .finish(&mut errors);
        if errors.is_empty() && self.password.trim() != self.confirm_password.trim() {
            errors.push(FieldError::new("confirmContraseña", PASSWORD_MISMATCH));
        }
        errors
    }
}

/// Authors and subjects share the single `nombre` field.
pub fn catalog_name(value: &str) -> Vec<FieldError> {
    let mut errors = Vec::new();
    Field::new("nombre", value)
        .len_between(3, 20)
        .finish(&mut errors);
    errors
}

pub fn overdue_message(value: &str) -> Vec<FieldError> {
    let mut errors = Vec::new();
    Field::new("message", value)
        .len_between(15, 255)
        .finish(&mut errors);
    errors
}

#[derive(Debug, Clone, Default)]
pub struct BookForm {
    pub isbn: String,
    pub title: String,
    pub description: String,
    pub genre: String,
    pub publication_year: String,
    pub authors: Vec<i64>,
    pub subjects: Vec<i64>,
}

impl BookForm {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        Field::new("isbn", &self.isbn)
            .len_between(10, 10)
            .finish(&mut errors);
        Field::new("titulo", &self.title)
            .len_between(3, 150)
            .finish(&mut errors);
        Field::new("descripcion", &self.description)
            .len_between(10, 255)
            .finish(&mut errors);
        Field::new("genero", &self.genre)
            .len_between(5, 50)
            .finish(&mut errors);
        Field::new("añoPublicacion", &self.publication_year)
            .len_between(4, 4)
            .finish(&mut errors);
        if self.authors.is_empty() {
            errors.push(FieldError::new("autores", "Se requiere al menos un autor"));
        }
        if self.subjects.is_empty() {
            errors.push(FieldError::new("materias", "Se requiere al menos una materia"));
        }
        errors
    }
}

#[derive(Debug, Clone, Default)]
pub struct StudentForm {
    pub first_names: String,
    pub last_names: String,
    pub email: String,
    pub address: String,
    pub phone: String,
    pub career: String,
    pub status: Option<String>,
}

impl StudentForm {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        Field::new("nombres", &self.first_names)
            .len_between(3, 255)
            .finish(&mut errors);
        Field::new("apellidos", &self.last_names)
            .len_between(3, 255)
            .finish(&mut errors);
        Field::new("correo", &self.email).email().finish(&mut errors);
        Field::new("direccion", &self.address)
            .len_between(5, 255)
            .finish(&mut errors);
        Field::new("telefono", &self.phone)
            .len_between(10, 10)
            .digits()
            .finish(&mut errors);
        Field::new("carrera", &self.career)
            .len_between(5, 100)
            .finish(&mut errors);
        optional_status("estado", self.status.as_deref(), &mut errors);
        errors
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserForm {
    pub first_names: String,
    pub last_names: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub status: Option<String>,
}

impl UserForm {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        Field::new("nombres", &self.first_names)
            .len_between(3, 255)
            .finish(&mut errors);
        Field::new("apellidos", &self.last_names)
            .len_between(3, 255)
            .finish(&mut errors);
        Field::new("usuario", &self.username)
            .len_between(3, 10)
            .finish(&mut errors);
        Field::new("correo", &self.email).email().finish(&mut errors);
        Field::new("rol", &self.role).required().finish(&mut errors);
        optional_status("estado", self.status.as_deref(), &mut errors);
        errors
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoanForm {
    pub student: String,
    pub book: String,
    pub due_date: String,
    pub loan_date: String,
    pub status: Option<String>,
}

impl LoanForm {
    pub fn validate(&self) -> Vec<FieldError> {
        self.validate_on(Local::now().date_naive())
    }

    /// Validates against a fixed "today" so date rules are testable.
    pub fn validate_on(&self, today: NaiveDate) -> Vec<FieldError> {
        let mut errors = Vec::new();
        Field::new("estudiante", &self.student)
            .required()
            .finish(&mut errors);
        Field::new("libro", &self.book).required().finish(&mut errors);
        Field::new("fechaDevolucion", &self.due_date)
            .required()
            .check(|v| loan_date_ok(v, today), INVALID_DATE)
            .finish(&mut errors);
        Field::new("fechaPrestamo", &self.loan_date)
            .required()
            .check(|v| loan_date_ok(v, today), INVALID_DATE)
            .finish(&mut errors);
        optional_status("estado", self.status.as_deref(), &mut errors);
        errors
    }
}

/// Loan dates must parse, fall in the current year and not be in the past.
fn loan_date_ok(value: &str, today: NaiveDate) -> bool {
    parse_date(value).is_some_and(|date| date.year() == today.year() && date >= today)
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time part.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let day = value.trim().get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn text(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn optional_text(value: &Value, key: &str) -> Option<String> {
    value.get(key).filter(|v| !v.is_null()).map(|_| text(value, key))
}

fn ids(value: &Value, key: &str) -> Vec<i64> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default()
}

/// Validates a create/update payload for `entity` before it is submitted.
pub fn entity_payload(entity: Entity, payload: &Value) -> Vec<FieldError> {
    match entity {
        Entity::Author | Entity::Subject => catalog_name(&text(payload, "nombre")),
        Entity::Book => BookForm {
            isbn: text(payload, "isbn"),
            title: text(payload, "titulo"),
            description: text(payload, "descripcion"),
            genre: text(payload, "genero"),
            publication_year: text(payload, "añoPublicacion"),
            authors: ids(payload, "autores"),
            subjects: ids(payload, "materias"),
        }
        .validate(),
        Entity::Student => StudentForm {
            first_names: text(payload, "nombres"),
            last_names: text(payload, "apellidos"),
            email: text(payload, "correo"),
            address: text(payload, "direccion"),
            phone: text(payload, "telefono"),
            career: text(payload, "carrera"),
            status: optional_text(payload, "estado"),
        }
        .validate(),
        Entity::User => UserForm {
            first_names: text(payload, "nombres"),
            last_names: text(payload, "apellidos"),
            username: text(payload, "usuario"),
            email: text(payload, "correo"),
            role: text(payload, "rol"),
            status: optional_text(payload, "estado"),
        }
        .validate(),
        Entity::Loan => LoanForm {
            student: text(payload, "estudiante"),
            book: text(payload, "libro"),
            due_date: text(payload, "fechaDevolucion"),
            loan_date: text(payload, "fechaPrestamo"),
            status: optional_text(payload, "estado"),
        }
        .validate(),
    }
}
