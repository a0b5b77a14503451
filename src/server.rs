use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::post,
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;
use tower_http::services::{ServeDir, ServeFile};

use crate::logging::{log_event, LogLevel};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_STATIC_DIR: &str = "dist";
const DEFAULT_LOG_LEVEL: LogLevel = LogLevel::Info;

const NAME_MAX_CHARS: usize = 80;
const SUBJECT_MAX_CHARS: usize = 140;
const MESSAGE_MIN_CHARS: usize = 10;

#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    port: u16,
    static_dir: PathBuf,
    log_level: LogLevel,
}

impl ServerConfig {
    fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let port = non_empty("PORT")
            .and_then(|value| value.parse::<u16>().ok())
            .filter(|port| *port != 0)
            .unwrap_or(DEFAULT_PORT);
        let static_dir = non_empty("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR));
        let log_level = non_empty("LOG_LEVEL")
            .as_deref()
            .and_then(LogLevel::parse)
            .unwrap_or(DEFAULT_LOG_LEVEL);

        Self {
            port,
            static_dir,
            log_level,
        }
    }
}

#[derive(Clone)]
struct AppState {
    log_level: LogLevel,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ContactSubmission {
    name: String,
    email: String,
    subject: String,
    message: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContactError {
    #[error("{label} is required.")]
    Required { field: &'static str, label: &'static str },
    #[error("Enter a valid email address.")]
    InvalidEmail,
    #[error("{label} should be at least {min} characters long.")]
    TooShort {
        field: &'static str,
        label: &'static str,
        min: usize,
    },
    #[error("{label} must be at most {max} characters.")]
    TooLong {
        field: &'static str,
        label: &'static str,
        max: usize,
    },
}

impl ContactError {
    pub fn field(&self) -> &'static str {
        match self {
            Self::Required { field, .. } | Self::TooShort { field, .. } | Self::TooLong { field, .. } => *field,
            Self::InvalidEmail => "email",
        }
    }
}

impl ContactSubmission {
    /// At most one error per field, in form order.
    pub fn validate(&self) -> Vec<ContactError> {
        let mut errors = Vec::new();

        let name = self.name.trim();
        if name.is_empty() {
            errors.push(ContactError::Required {
                field: "name",
                label: "Name",
            });
        } else if name.chars().count() > NAME_MAX_CHARS {
            errors.push(ContactError::TooLong {
                field: "name",
                label: "Name",
                max: NAME_MAX_CHARS,
            });
        }

        let email = self.email.trim();
        if email.is_empty() {
            errors.push(ContactError::Required {
                field: "email",
                label: "Email",
            });
        } else if !looks_like_email(email) {
            errors.push(ContactError::InvalidEmail);
        }

        if self.subject.trim().chars().count() > SUBJECT_MAX_CHARS {
            errors.push(ContactError::TooLong {
                field: "subject",
                label: "Subject",
                max: SUBJECT_MAX_CHARS,
            });
        }

        let message = self.message.trim();
        if message.is_empty() {
            errors.push(ContactError::Required {
                field: "message",
                label: "Message",
            });
        } else if message.chars().count() < MESSAGE_MIN_CHARS {
            errors.push(ContactError::TooShort {
                field: "message",
                label: "Message",
                min: MESSAGE_MIN_CHARS,
            });
        }

        errors
    }
}

fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.rsplit_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.contains('.')
        && !value.chars().any(char::is_whitespace)
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env();
    let bind_address = format!("0.0.0.0:{}", config.port);
    let app = router(&config);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    log_event(
        config.log_level,
        LogLevel::Info,
        "server_listening",
        json!({
            "url": format!("http://127.0.0.1:{}", config.port),
            "staticDir": config.static_dir.display().to_string(),
        }),
    );
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(config: &ServerConfig) -> Router {
    let index = config.static_dir.join("index.html");
    let static_service = ServeDir::new(&config.static_dir).not_found_service(ServeFile::new(index));

    Router::new()
        .route("/contact/", post(submit_contact))
        .fallback_service(static_service)
        .with_state(AppState {
            log_level: config.log_level,
        })
}

async fn submit_contact(
    State(state): State<AppState>,
    Form(submission): Form<ContactSubmission>,
) -> Response {
    let errors = submission.validate();

    if !errors.is_empty() {
        log_event(
            state.log_level,
            LogLevel::Info,
            "contact_message_rejected",
            json!({ "fields": errors.iter().map(ContactError::field).collect::<Vec<_>>() }),
        );

        let fields: serde_json::Map<String, serde_json::Value> = errors
            .iter()
            .map(|error| (error.field().to_string(), serde_json::Value::String(error.to_string())))
            .collect();
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "ok": false, "errors": fields })),
        )
            .into_response();
    }

    log_event(
        state.log_level,
        LogLevel::Info,
        "contact_message_received",
        json!({
            "hasSubject": !submission.subject.trim().is_empty(),
            "messageChars": submission.message.trim().chars().count(),
        }),
    );

    Redirect::to("/").into_response()
}
