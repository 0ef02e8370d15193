use super::session::{
    clear_notice, end_session, pending_notice, with_notice, with_session, AuthContext,
};
use super::AppState;
use crate::app::{Enquiry, ItemForm, Notice};
use crate::domain::{CatalogRow, ItemCode, SearchCriteria};
use askama::Template;
use axum::extract::{Form, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Json, Redirect, Response};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IndexParams {
    pub search: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Serialize)]
pub struct IndexPage {
    pub results: Vec<CatalogRow>,
    pub types: Vec<String>,
    pub search: String,
    pub selected_type: String,
    pub notice: Option<Notice>,
}

#[derive(Debug, Serialize)]
pub struct ProductsPage {
    pub products: Vec<CatalogRow>,
    pub notice: Option<Notice>,
}

#[derive(Debug, Serialize)]
pub struct ItemAdminPage {
    pub form: ItemForm,
    pub is_new: bool,
    pub notice: Option<Notice>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub password: String,
}

fn to_login() -> Response {
    Redirect::to("/login").into_response()
}

/// Render a page, consuming the pending notice if there was one
fn page<T: Serialize>(body: T, had_notice: bool) -> Response {
    let response = Json(body).into_response();
    if had_notice {
        clear_notice(response)
    } else {
        response
    }
}

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    notice: Option<Notice>,
}

pub async fn login_page(headers: HeaderMap) -> Response {
    let notice = pending_notice(&headers);
    let had_notice = notice.is_some();

    let response = match (LoginTemplate { notice }).render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Rendering login page failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "login page unavailable").into_response();
        }
    };
    if had_notice {
        clear_notice(response)
    } else {
        response
    }
}

pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    if state.auth.check_password(&form.password) {
        info!("Staff login succeeded");
        let response = with_session(Redirect::to("/").into_response(), &state.auth);
        with_notice(response, &Notice::success("Logged in"))
    } else {
        info!("Staff login rejected");
        with_notice(to_login(), &Notice::failure("Incorrect password"))
    }
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let response = end_session(to_login(), &headers, &state.auth);
    with_notice(response, &Notice::success("Logged out"))
}

pub async fn index(
    auth: AuthContext,
    State(state): State<AppState>,
    Query(params): Query<IndexParams>,
    headers: HeaderMap,
) -> Response {
    if !auth.can_access() {
        return to_login();
    }
    let mut notice = pending_notice(&headers);
    let had_notice = notice.is_some();

    let criteria = SearchCriteria::new(Some(&params.search), Some(&params.kind));
    let results = match state.inventory.query.search(&criteria).await {
        Ok(rows) => rows,
        Err(e) => {
            error!("Search failed: {}", e);
            notice = Some(Notice::failure(e.user_notice()));
            Vec::new()
        }
    };
    let types = match state.inventory.query.categories().await {
        Ok(types) => types,
        Err(e) => {
            error!("Loading categories failed: {}", e);
            notice = Some(Notice::failure(e.user_notice()));
            Vec::new()
        }
    };

    page(
        IndexPage {
            results,
            types,
            search: params.search,
            selected_type: params.kind,
            notice,
        },
        had_notice,
    )
}

pub async fn enquiry(
    auth: AuthContext,
    State(state): State<AppState>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Response {
    if !auth.can_access() {
        return to_login();
    }
    let selected: Vec<String> = pairs
        .into_iter()
        .filter(|(key, _)| key == "selected_items")
        .map(|(_, value)| value)
        .collect();

    match state.inventory.enquiries.compose(&selected).await {
        Ok(Some(enquiry)) => Json::<Enquiry>(enquiry).into_response(),
        Ok(None) => with_notice(
            Redirect::to("/").into_response(),
            &Notice::failure("Please select at least one item"),
        ),
        Err(e) => {
            error!("Composing enquiry failed: {}", e);
            with_notice(
                Redirect::to("/").into_response(),
                &Notice::failure(e.user_notice()),
            )
        }
    }
}

pub async fn submit_enquiry(auth: AuthContext) -> Response {
    if !auth.can_access() {
        return to_login();
    }
    info!("Enquiry submitted");
    with_notice(
        Redirect::to("/").into_response(),
        &Notice::success("Enquiry submitted"),
    )
}

pub async fn all_products(
    auth: AuthContext,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    if !auth.can_access() {
        return to_login();
    }
    let mut notice = pending_notice(&headers);
    let had_notice = notice.is_some();

    let products = match state.inventory.query.list_all().await {
        Ok(rows) => rows,
        Err(e) => {
            error!("Listing products failed: {}", e);
            notice = Some(Notice::failure(e.user_notice()));
            Vec::new()
        }
    };
    page(ProductsPage { products, notice }, had_notice)
}

pub async fn new_item(auth: AuthContext, headers: HeaderMap) -> Response {
    if !auth.can_access() {
        return to_login();
    }
    let notice = pending_notice(&headers);
    let had_notice = notice.is_some();
    page(
        ItemAdminPage {
            form: ItemForm::default(),
            is_new: true,
            notice,
        },
        had_notice,
    )
}

pub async fn edit_item(
    auth: AuthContext,
    State(state): State<AppState>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !auth.can_access() {
        return to_login();
    }
    let back = || Redirect::to("/all_products").into_response();

    let code = match code.trim().parse::<i64>() {
        Ok(n) => ItemCode(n),
        Err(_) => return with_notice(back(), &Notice::failure(format!("Unknown item '{code}'"))),
    };

    match state.inventory.query.item(code).await {
        Ok(Some(record)) => {
            let notice = pending_notice(&headers);
            let had_notice = notice.is_some();
            page(
                ItemAdminPage {
                    form: ItemForm::from_record(&record),
                    is_new: false,
                    notice,
                },
                had_notice,
            )
        }
        Ok(None) => with_notice(back(), &Notice::failure(format!("Item {code} not found"))),
        Err(e) => {
            error!("Loading item {} failed: {}", code, e);
            with_notice(back(), &Notice::failure(e.user_notice()))
        }
    }
}

pub async fn submit_form(
    auth: AuthContext,
    State(state): State<AppState>,
    Form(form): Form<ItemForm>,
) -> Response {
    if !auth.can_access() {
        return to_login();
    }
    let notice = match state.inventory.reconciler.save(&form).await {
        Ok(outcome) => outcome.notice(),
        Err(e) => Notice::failure(e.user_notice()),
    };
    with_notice(Redirect::to("/all_products").into_response(), &notice)
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "inventory-desk",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn metrics() -> Response {
    match crate::observability::render() {
        Some(body) => body.into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}
