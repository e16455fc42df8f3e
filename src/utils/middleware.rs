use salvo::prelude::*;

use crate::models::{AuthContext, InvocationContext, QueryUser};
use crate::utils::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const SESSION_ID_HEADER: &str = "x-session-id";
pub const AUTH_CONFIG_ID_HEADER: &str = "x-auth-config-id";

pub struct StateInjector {
    state: AppState,
}

impl StateInjector {
    pub fn new(state: AppState) -> Self {
        StateInjector { state }
    }
}

#[async_trait]
impl Handler for StateInjector {
    async fn handle(&self, _req: &mut Request, depot: &mut Depot, _res: &mut Response, _ctrl: &mut FlowCtrl) {
        depot.inject(self.state.clone());
    }
}

pub fn inject_state(state: AppState) -> StateInjector {
    StateInjector::new(state)
}

fn header(req: &Request, name: &str) -> Option<String> {
    req.header::<String>(name).filter(|value| !value.trim().is_empty())
}

/// Turns the identity headers set by the fronting auth layer into an
/// explicit invocation context. Missing headers mean an anonymous caller.
#[handler]
pub async fn invocation_context(req: &mut Request, depot: &mut Depot) {
    let ctx = InvocationContext {
        user: header(req, USER_ID_HEADER).map(|id| QueryUser { id, email: None }),
        auth: AuthContext {
            session_id: header(req, SESSION_ID_HEADER),
            config_id: header(req, AUTH_CONFIG_ID_HEADER),
        },
    };
    depot.inject(ctx);
}

pub fn current_context(depot: &Depot) -> InvocationContext {
    depot.obtain::<InvocationContext>().cloned().unwrap_or_default()
}
