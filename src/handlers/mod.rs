pub mod health;

use askama::Template;
use axum::{extract::State, response::Html};

use crate::auth::gate::{self, AuthUser};
use crate::auth::UserIdentity;
use crate::db::LogOnError;
use crate::session::{Flash, Session};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
  pub flash: Option<Flash>,
  pub user: Option<UserIdentity>,
}

#[derive(Template)]
#[template(path = "protected.html")]
pub struct ProtectedTemplate {
  pub flash: Option<Flash>,
  pub user: UserIdentity,
}

/// GET / - Landing page
pub async fn index(State(state): State<AppState>, session: Session) -> Html<String> {
  let template = IndexTemplate {
    flash: session.take_flash().log_warn("Failed to read flash").flatten(),
    user: gate::current_user(&state, &session)
      .log_warn("Failed to resolve session user")
      .flatten(),
  };
  Html(template.render().unwrap_or_default())
}

/// GET /protected - Only reachable with an authenticated session
pub async fn protected(AuthUser(user): AuthUser, session: Session) -> Html<String> {
  let template = ProtectedTemplate {
    flash: session.take_flash().log_warn("Failed to read flash").flatten(),
    user,
  };
  Html(template.render().unwrap_or_default())
}

pub use health::health;
