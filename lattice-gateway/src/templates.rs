//! HTML bootstrap pages.
//!
//! The gateway is API-first; these templates exist so a browser pointed at
//! it gets something usable — a welcome page, a login form, and an error
//! page. They are compiled into the binary and rendered from the response
//! envelope.

use std::sync::Arc;

use minijinja::Environment;

use lattice_core::GatewayError;

use crate::negotiate::Emitter;

/// Build the template environment with every page the routes can install.
pub fn environment() -> Result<Environment<'static>, minijinja::Error> {
    let mut env = Environment::new();
    env.add_template("index.html", include_str!("../templates/index.html"))?;
    env.add_template("login.html", include_str!("../templates/login.html"))?;
    env.add_template("500.html", include_str!("../templates/500.html"))?;
    Ok(env)
}

/// A request-scoped `text/html` emitter for one named template.
pub fn renderer(env: Arc<Environment<'static>>, name: &'static str) -> Emitter {
    Emitter::renderer(move |envelope| {
        let template = env
            .get_template(name)
            .map_err(|e| GatewayError::Internal(format!("missing template {name}: {e}")))?;
        template
            .render(minijinja::Value::from_serialize(envelope))
            .map_err(|e| GatewayError::Internal(format!("rendering {name} failed: {e}")))
    })
}
