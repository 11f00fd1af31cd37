use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::ProtocolError;
use crate::media::MediaEngine;
use crate::registry::Registry;
use crate::session::{Handle, TransportId};
use crate::videoroom::{self, Jsep};

/// What the transport layer should do with a `Dispatched` outcome: write
/// the ack immediately (if present), then write the final reply.
pub struct Dispatched {
    pub ack: Option<Value>,
    pub reply: Value,
}

pub struct Dispatcher {
    pub registry: Registry,
    pub engine: Box<dyn MediaEngine>,
    pub settings: janusd_config::Settings,
}

impl Dispatcher {
    pub fn new(engine: Box<dyn MediaEngine>, settings: janusd_config::Settings) -> Self {
        Self {
            registry: Registry::new(),
            engine,
            settings,
        }
    }

    /// Parses and handles one top-level request. `transport` identifies
    /// the connection the request arrived on, so a freshly created
    /// session can be bound to it.
    pub async fn dispatch(&self, request: &Value, transport: TransportId) -> Dispatched {
        match self.dispatch_inner(request, transport).await {
            Ok(dispatched) => dispatched,
            Err(e) => Dispatched {
                ack: None,
                reply: error_envelope(request, &e),
            },
        }
    }

    async fn dispatch_inner(
        &self,
        request: &Value,
        transport: TransportId,
    ) -> Result<Dispatched, ProtocolError> {
        if !request.is_object() {
            return Err(ProtocolError::NotAnObject);
        }
        let command = request
            .get("janus")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingElement("janus"))?;
        let transaction = request
            .get("transaction")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingElement("transaction"))?;

        debug!(command, transaction, "dispatching request");

        match command {
            "ping" => Ok(Dispatched {
                ack: None,
                reply: json!({"janus": "pong", "transaction": transaction}),
            }),
            "info" => Ok(Dispatched {
                ack: None,
                reply: json!({
                    "janus": "server_info",
                    "transaction": transaction,
                    "name": self.settings.janus.server_name,
                    "version": self.settings.janus.version,
                    "version_string": self.settings.janus.version_string,
                    "plugins": {
                        "janus.plugin.videoroom": { "name": "JANUS VideoRoom plugin" }
                    }
                }),
            }),
            "add_token" => self.handle_add_token(request, transaction),
            "create" => self.handle_create(request, transaction, transport),
            "keepalive" => self.handle_keepalive(request, transaction),
            "attach" => self.handle_attach(request, transaction),
            "message" => self.handle_message(request, transaction).await,
            "trickle" => self.handle_trickle(request, transaction).await,
            other => Err(ProtocolError::Unhandled(other.to_string())),
        }
    }

    fn require_admin(&self, request: &Value) -> Result<(), ProtocolError> {
        match &self.settings.janus.admin_secret {
            None => Ok(()),
            Some(expected) => {
                let provided = request.get("admin_secret").and_then(Value::as_str);
                if provided == Some(expected.as_str()) {
                    Ok(())
                } else {
                    Err(ProtocolError::Forbidden)
                }
            }
        }
    }

    fn handle_add_token(&self, request: &Value, transaction: &str) -> Result<Dispatched, ProtocolError> {
        self.require_admin(request)?;
        let token = request
            .get("token")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingElement("token"))?;
        self.registry.add_token(token.to_string());
        Ok(Dispatched {
            ack: None,
            reply: json!({
                "janus": "success",
                "transaction": transaction,
                "data": { "plugins": ["janus.plugin.videoroom"] },
            }),
        })
    }

    fn handle_create(
        &self,
        request: &Value,
        transaction: &str,
        transport: TransportId,
    ) -> Result<Dispatched, ProtocolError> {
        let requested_id = request.get("id").and_then(Value::as_u64);
        let session = self.registry.create_session(requested_id);
        session.add_transport(transport);
        Ok(Dispatched {
            ack: None,
            reply: json!({
                "janus": "success",
                "transaction": transaction,
                "data": { "id": session.id },
            }),
        })
    }

    fn session_from(&self, request: &Value) -> Result<Arc<crate::session::Session>, ProtocolError> {
        let session_id = request
            .get("session_id")
            .and_then(Value::as_u64)
            .ok_or(ProtocolError::MissingElement("session_id"))?;
        self.registry
            .lookup_session(session_id)
            .ok_or(ProtocolError::NoSuchSession(session_id))
    }

    fn handle_keepalive(&self, request: &Value, transaction: &str) -> Result<Dispatched, ProtocolError> {
        let session = self.session_from(request)?;
        Ok(Dispatched {
            ack: None,
            reply: json!({
                "janus": "ack",
                "transaction": transaction,
                "session_id": session.id,
            }),
        })
    }

    fn handle_attach(&self, request: &Value, transaction: &str) -> Result<Dispatched, ProtocolError> {
        let session = self.session_from(request)?;
        let plugin = request
            .get("plugin")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingElement("plugin"))?;
        if plugin != "janus.plugin.videoroom" {
            return Err(ProtocolError::UnsupportedPlugin(plugin.to_string()));
        }
        let handle_id = self.registry.allocate_handle_id();
        session.insert_handle(Handle::new(handle_id, session.id));
        Ok(Dispatched {
            ack: None,
            reply: json!({
                "janus": "success",
                "transaction": transaction,
                "session_id": session.id,
                "data": { "id": handle_id },
            }),
        })
    }

    async fn handle_message(&self, request: &Value, transaction: &str) -> Result<Dispatched, ProtocolError> {
        let session = self.session_from(request)?;
        let handle_id = request
            .get("handle_id")
            .and_then(Value::as_u64)
            .ok_or(ProtocolError::MissingElement("handle_id"))?;
        if !session.has_handle(handle_id) {
            return Err(ProtocolError::Unhandled("no such handle".into()));
        }

        let body = request.get("body").cloned().unwrap_or(json!({}));
        let request_name = body
            .get("request")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        let jsep: Option<Jsep> = request
            .get("jsep")
            .and_then(|j| serde_json::from_value(j.clone()).ok());

        let ack = if videoroom::needs_early_ack(&request_name) {
            Some(json!({
                "janus": "ack",
                "transaction": transaction,
                "session_id": session.id,
            }))
        } else {
            None
        };

        let result = videoroom::dispatch_message(
            &self.registry,
            &session,
            handle_id,
            &body,
            jsep.as_ref(),
            self.engine.as_ref(),
        )
        .await;

        match result {
            Ok(reply) => {
                let mut envelope = json!({
                    "janus": "success",
                    "transaction": transaction,
                    "session_id": session.id,
                    "sender": handle_id,
                    "plugindata": {
                        "plugin": "janus.plugin.videoroom",
                        "data": reply.data,
                    },
                });
                if let Some(jsep) = reply.jsep {
                    envelope["jsep"] = json!({ "type": jsep.kind, "sdp": jsep.sdp });
                }
                Ok(Dispatched { ack, reply: envelope })
            }
            Err(e) => {
                warn!(code = e.code(), reason = %e, "videoroom request failed");
                Ok(Dispatched {
                    ack,
                    reply: error_envelope_with_context(transaction, Some(session.id), Some(handle_id), &e),
                })
            }
        }
    }

    async fn handle_trickle(&self, request: &Value, transaction: &str) -> Result<Dispatched, ProtocolError> {
        let session = self.session_from(request)?;
        let handle_id = request
            .get("handle_id")
            .and_then(Value::as_u64)
            .ok_or(ProtocolError::MissingElement("handle_id"))?;
        let candidate = request
            .get("candidate")
            .ok_or(ProtocolError::MissingElement("candidate"))?;

        crate::trickle::handle(&self.registry, &session, handle_id, candidate, self.engine.as_ref())
            .await?;

        // Trickle's final reply IS the ack — there is no separate early
        // frame, unlike join/configure/start.
        Ok(Dispatched {
            ack: None,
            reply: json!({
                "janus": "ack",
                "transaction": transaction,
                "session_id": session.id,
            }),
        })
    }
}

fn error_envelope(request: &Value, e: &ProtocolError) -> Value {
    let transaction = request.get("transaction").and_then(Value::as_str).unwrap_or("");
    let session_id = request.get("session_id").and_then(Value::as_u64);
    let handle_id = request.get("handle_id").and_then(Value::as_u64);
    error_envelope_with_context(transaction, session_id, handle_id, e)
}

fn error_envelope_with_context(
    transaction: &str,
    session_id: Option<u64>,
    handle_id: Option<u64>,
    e: &ProtocolError,
) -> Value {
    let mut envelope = json!({
        "janus": "error",
        "transaction": transaction,
        "error": { "code": e.code(), "reason": e.to_string() },
    });
    if let Some(id) = session_id {
        envelope["session_id"] = json!(id);
    }
    if let Some(id) = handle_id {
        envelope["sender"] = json!(id);
    }
    envelope
}
