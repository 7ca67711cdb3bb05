//! Method dispatch.
//!
//! The table from method tag to handler is built once at startup. Each
//! handler decodes its typed request, calls into [`Pool`] and encodes the
//! typed response; the connection task only ever sees JSON values.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::str::FromStr;

use crate::pool::Pool;
use crate::protocol::{Method, ProtocolError, Status};
use crate::session::Session;
use crate::tracing::prelude::*;

/// What to send back, and whether to hang up afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub result: Value,
    pub close: bool,
}

impl Reply {
    fn status(status: Status) -> Self {
        Self {
            result: json!({ "status": status.as_str() }),
            close: false,
        }
    }

    fn closing(status: Status) -> Self {
        Self {
            close: true,
            ..Self::status(status)
        }
    }
}

type Handler = fn(&Pool, &mut Session, Value) -> Result<Reply, ProtocolError>;

pub struct Router {
    handlers: HashMap<Method, Handler>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        let handlers = Method::ALL
            .into_iter()
            .map(|method| {
                let handler: Handler = match method {
                    Method::Login => login,
                    Method::GetJob => get_job,
                    Method::GetFullScratchpad => get_full_scratchpad,
                    Method::SubmitShare => submit_share,
                };
                (method, handler)
            })
            .collect();
        Self { handlers }
    }

    /// Run one request. Decoding problems become an `invalid request` status.
    pub fn dispatch(&self, pool: &Pool, session: &mut Session, method: &str, params: Value) -> Reply {
        let result = Method::from_str(method)
            .ok()
            .and_then(|m| self.handlers.get(&m))
            .ok_or_else(|| ProtocolError::UnknownMethod(method.to_string()))
            .and_then(|handler| handler(pool, session, params));

        result.unwrap_or_else(|e| {
            debug!(method, error = %e, "Invalid request");
            Reply::status(Status::InvalidRequest)
        })
    }
}

fn login(pool: &Pool, session: &mut Session, params: Value) -> Result<Reply, ProtocolError> {
    let req = decode(params)?;
    match pool.login(session, req) {
        Ok(resp) => encode(&resp),
        Err(e) => {
            debug!(error = %e, "Closing connection after failed login");
            Ok(Reply::closing(Status::Unauthorized))
        }
    }
}

fn get_job(pool: &Pool, session: &mut Session, params: Value) -> Result<Reply, ProtocolError> {
    respond(params, |req| pool.get_job(session, req))
}

fn get_full_scratchpad(
    pool: &Pool,
    session: &mut Session,
    params: Value,
) -> Result<Reply, ProtocolError> {
    respond(params, |req| pool.get_full_scratchpad(session, req))
}

fn submit_share(pool: &Pool, session: &mut Session, params: Value) -> Result<Reply, ProtocolError> {
    respond(params, |req| pool.submit_share(session, req))
}

fn respond<Req, Resp>(params: Value, f: impl FnOnce(Req) -> Resp) -> Result<Reply, ProtocolError>
where
    Req: DeserializeOwned,
    Resp: Serialize,
{
    encode(&f(decode(params)?))
}

/// Missing params decode like an empty object.
fn decode<T: DeserializeOwned>(params: Value) -> Result<T, ProtocolError> {
    let params = if params.is_null() {
        Value::Object(Default::default())
    } else {
        params
    };
    Ok(serde_json::from_value(params)?)
}

fn encode<T: Serialize>(resp: &T) -> Result<Reply, ProtocolError> {
    Ok(Reply {
        result: serde_json::to_value(resp)?,
        close: false,
    })
}
