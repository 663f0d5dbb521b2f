//! Health check endpoint
//! Reports which payment backends are registered and how many intents are tracked

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::collections::HashMap;

use crate::api::AppState;
use crate::payments::types::PaymentMethod;

/// Health status response
#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: HealthState,
    pub checks: HashMap<String, ComponentHealth>,
    pub tracked_intents: usize,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Overall health state
#[derive(Debug, Serialize, Clone, PartialEq)]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Individual component health status
#[derive(Debug, Serialize, Clone)]
pub struct ComponentHealth {
    pub status: ComponentState,
    pub details: Option<String>,
}

/// Component state
#[derive(Debug, Serialize, Clone, PartialEq)]
pub enum ComponentState {
    Up,
    Down,
}

impl HealthStatus {
    pub fn from_methods(available: &[PaymentMethod], tracked_intents: usize) -> Self {
        let checks: HashMap<String, ComponentHealth> = PaymentMethod::all()
            .into_iter()
            .map(|method| {
                let health = if available.contains(&method) {
                    ComponentHealth {
                        status: ComponentState::Up,
                        details: None,
                    }
                } else {
                    ComponentHealth {
                        status: ComponentState::Down,
                        details: Some("not configured".to_string()),
                    }
                };
                (method.to_string(), health)
            })
            .collect();

        let status = match available.len() {
            0 => HealthState::Unhealthy,
            n if n < PaymentMethod::all().len() => HealthState::Degraded,
            _ => HealthState::Healthy,
        };

        Self {
            status,
            checks,
            tracked_intents,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let status = HealthStatus::from_methods(
        &state.service.available_methods(),
        state.service.tracker().len().await,
    );
    let code = if status.status == HealthState::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (code, Json(status))
}
