//! Agent behavior trait and per-envelope context.

// Layer 1: Standard library imports
use std::error::Error;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use serde_json::Value;

// Layer 3: Internal module imports
use super::error::MeshError;
use super::router::{AskOptions, Router};
use crate::message::Envelope;
use crate::util::AgentAddress;

/// Message-handling logic of one agent.
///
/// The system drains the agent's mailbox strictly one envelope at a
/// time, awaiting completion before taking the next. Behaviors suspend
/// only at explicit asks and sleeps; they must not block the runtime
/// thread. A returned error is isolated: the agent survives, the error is
/// surfaced as a router event, and an `ErrorReply` is synthesized when
/// the incoming envelope was an `Ask`.
///
/// # Example
/// ```rust,ignore
/// struct Echo;
///
/// #[async_trait]
/// impl AgentBehavior for Echo {
///     type Error = std::io::Error;
///
///     async fn on_envelope(
///         &mut self,
///         envelope: Envelope,
///         context: &mut AgentContext,
///     ) -> Result<(), Self::Error> {
///         let _ = context.reply(envelope.payload.clone());
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait AgentBehavior: Send + 'static {
    /// The error type returned by this behavior.
    type Error: Error + Send + Sync + 'static;

    /// Handle one incoming envelope.
    async fn on_envelope(
        &mut self,
        envelope: Envelope,
        context: &mut AgentContext,
    ) -> Result<(), Self::Error>;
}

/// Capabilities handed to a behavior for the duration of one envelope.
///
/// A fresh context is constructed per invocation and must not be
/// retained beyond it.
pub struct AgentContext {
    address: AgentAddress,
    incoming: Envelope,
    router: Router,
}

impl AgentContext {
    pub(crate) fn new(address: AgentAddress, incoming: Envelope, router: Router) -> Self {
        Self {
            address,
            incoming,
            router,
        }
    }

    /// This agent's own address.
    pub fn address(&self) -> &AgentAddress {
        &self.address
    }

    /// The envelope currently being handled.
    pub fn incoming(&self) -> &Envelope {
        &self.incoming
    }

    /// Answer the incoming envelope with a correlated `Reply`.
    pub fn reply(&self, payload: Value) -> Result<(), MeshError> {
        if self.router.is_destroyed() {
            return Err(MeshError::RouterShutdown);
        }
        self.router
            .route(Envelope::reply_to(&self.incoming, self.address.clone(), payload));
        Ok(())
    }

    /// Answer the incoming envelope with a correlated `ErrorReply`.
    pub fn error_reply(&self, payload: Value) -> Result<(), MeshError> {
        if self.router.is_destroyed() {
            return Err(MeshError::RouterShutdown);
        }
        self.router.route(Envelope::error_reply_to(
            &self.incoming,
            self.address.clone(),
            payload,
        ));
        Ok(())
    }

    /// Fire-and-forget send to another agent.
    pub fn tell(
        &self,
        to: AgentAddress,
        payload: Value,
        options: AskOptions,
    ) -> Result<(), MeshError> {
        self.router.tell(self.address.clone(), to, payload, options)
    }

    /// Ask another agent and await the correlated reply. This is a
    /// cooperative suspension point for the behavior.
    pub async fn ask(
        &self,
        to: AgentAddress,
        payload: Value,
        options: AskOptions,
    ) -> Result<Envelope, MeshError> {
        self.router
            .ask(self.address.clone(), to, payload, options)
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests are allowed to use unwrap for simplicity
mod tests {
    use super::*;
    use crate::mailbox::PriorityMailbox;
    use crate::message::MessageKind;
    use serde_json::json;

    fn addr(name: &str) -> AgentAddress {
        AgentAddress::new(name)
    }

    #[tokio::test]
    async fn test_reply_routes_correlated_envelope() {
        let router = Router::new();
        let (mut mailbox_a, sender_a) = PriorityMailbox::new(10);
        router.add_actor(addr("a"), sender_a);

        let incoming = Envelope::new(addr("a"), addr("b"), json!("hi"));
        let context = AgentContext::new(addr("b"), incoming.clone(), router);

        context.reply(json!("hello")).unwrap();

        let reply = mailbox_a.recv().await.unwrap();
        assert_eq!(reply.kind, MessageKind::Reply);
        assert_eq!(reply.correlation_id, Some(incoming.id));
        assert_eq!(reply.from, addr("b"));
    }

    #[tokio::test]
    async fn test_error_reply_kind() {
        let router = Router::new();
        let (mut mailbox_a, sender_a) = PriorityMailbox::new(10);
        router.add_actor(addr("a"), sender_a);

        let incoming = Envelope::new(addr("a"), addr("b"), json!(null));
        let context = AgentContext::new(addr("b"), incoming, router);

        context.error_reply(json!({"error": "nope"})).unwrap();

        let reply = mailbox_a.recv().await.unwrap();
        assert_eq!(reply.kind, MessageKind::ErrorReply);
    }

    #[tokio::test]
    async fn test_reply_after_router_destroy_fails() {
        let router = Router::new();
        let incoming = Envelope::new(addr("a"), addr("b"), json!(null));
        let context = AgentContext::new(addr("b"), incoming, router.clone());

        router.destroy();
        assert!(matches!(
            context.reply(json!(null)),
            Err(MeshError::RouterShutdown)
        ));
    }
}
