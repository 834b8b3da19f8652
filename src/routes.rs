use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::display::TickerView;
use crate::widget::{TickerSnapshot, TickerWidget};

pub struct AppState {
    pub widget: Arc<TickerWidget>,
    pub title: String,
}

impl AppState {
    fn view(&self, seen: Option<u64>) -> TickerView {
        TickerView::build(&self.title, &self.widget.snapshot(), Utc::now())
            .seen_revision(seen)
            .flash_for(self.widget.settings().flash_duration)
    }
}

/// Sent back by the polling fragment: the revision it is currently showing.
#[derive(Debug, Default, Deserialize)]
pub struct FragmentQuery {
    pub seen: Option<u64>,
}

// Template structs
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub ticker: TickerView,
}

#[derive(Template)]
#[template(path = "ticker.html")]
pub struct TickerTemplate {
    pub ticker: TickerView,
}

// Wrapper for HTML responses
struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

// Route handlers
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    HtmlTemplate(IndexTemplate {
        ticker: state.view(None),
    })
}

pub async fn ticker(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FragmentQuery>,
) -> impl IntoResponse {
    HtmlTemplate(TickerTemplate {
        ticker: state.view(query.seen),
    })
}

pub async fn tickers_json(State(state): State<Arc<AppState>>) -> Json<TickerSnapshot> {
    Json(state.widget.snapshot())
}

pub async fn refresh(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let widget = state.widget.clone();
    tokio::spawn(async move {
        widget.refresh().await;
    });

    // Render what is showing now; the next poll picks up the result
    HtmlTemplate(TickerTemplate {
        ticker: state.view(None),
    })
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}
