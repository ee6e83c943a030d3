//! Shared-secret middleware for the admin routes.
//!
//! The request must carry the configured secret in the `x-admin-secret` header. The secret is read from the
//! [`AdminSecret`] registered as app data. If none is registered, or it is empty, every request is rejected with a
//! 401 Unauthorized response.
use std::{future::Future, pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web,
    Error,
};
use duka_common::Secret;
use futures::future::{ok, Ready};
use log::*;

use crate::errors::ServerError;

pub const ADMIN_SECRET_HEADER: &str = "x-admin-secret";

#[derive(Debug, Clone, Default)]
pub struct AdminSecret(pub Secret<String>);

impl AdminSecret {
    pub fn new<S: Into<String>>(secret: S) -> Self {
        Self(Secret::new(secret.into()))
    }

    pub fn is_configured(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn accepts(&self, candidate: &str) -> bool {
        self.is_configured() && secrets_match(self.0.reveal().as_bytes(), candidate.as_bytes())
    }
}

/// Compares two secrets in time that depends only on their lengths.
pub fn secrets_match(expected: &[u8], candidate: &[u8]) -> bool {
    if expected.len() != candidate.len() {
        return false;
    }
    expected.iter().zip(candidate).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

#[derive(Default)]
pub struct AdminAuthFactory;

impl AdminAuthFactory {
    pub fn new() -> Self {
        Self
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdminAuthFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AdminAuthService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AdminAuthService { service: Rc::new(service) })
    }
}

pub struct AdminAuthService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AdminAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        Box::pin(async move {
            let Some(secret) = req.app_data::<web::Data<AdminSecret>>().filter(|s| s.is_configured()) else {
                warn!("💻️ Admin request to {} rejected. No admin secret has been configured.", req.path());
                return Err(ServerError::AdminAccessRequired.into());
            };
            let candidate = req.headers().get(ADMIN_SECRET_HEADER).and_then(|v| v.to_str().ok()).unwrap_or_default();
            if secret.accepts(candidate) {
                trace!("💻️ Admin access granted for {}", req.path());
                service.call(req).await
            } else {
                warn!("💻️ Admin request to {} rejected. Missing or incorrect admin secret.", req.path());
                Err(ServerError::AdminAccessRequired.into())
            }
        })
    }
}
