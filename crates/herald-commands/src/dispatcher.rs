//! Command registry and dispatch

use async_trait::async_trait;
use herald_core::error::{Error, Result};
use herald_core::store::{AuditStore, SubscriberStore};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Commands anyone may run; everything else requires a persisted admin
const SAFE_COMMANDS: &[&str] = &["help", "solve", "time", "currency", "mute", "unmute"];

/// Resolved caller identity plus the store handle, passed to every handler
/// whether it needs them or not.
pub struct CommandContext {
    pub store: Arc<dyn SubscriberStore>,
    pub caller: String,
    pub admin: bool,
}

/// One chat command. `run` returns the reply text; error kinds decide how
/// the dispatcher renders failure (usage line, verbatim message, or
/// propagation).
#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &str;
    fn usage(&self) -> &str;
    fn description(&self) -> &str;
    async fn run(&self, ctx: &CommandContext, args: &[String]) -> Result<String>;
}

pub struct Dispatcher {
    commands: BTreeMap<String, Arc<dyn Command>>,
    store: Arc<dyn SubscriberStore>,
    audit: Arc<dyn AuditStore>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn SubscriberStore>, audit: Arc<dyn AuditStore>) -> Self {
        Self {
            commands: BTreeMap::new(),
            store,
            audit,
        }
    }

    pub fn register(&mut self, command: Arc<dyn Command>) {
        debug!("Registering command: {}", command.name());
        self.commands.insert(command.name().to_string(), command);
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    fn listing(&self) -> String {
        let mut out = String::from("My available commands:\n");
        for command in self.commands.values() {
            out.push_str(&format!(
                "{} - {}\n",
                command.name(),
                command.description()
            ));
        }
        out
    }

    /// Route one inbound message and produce the reply text.
    ///
    /// The audit record is written before anything else, including for
    /// messages that turn out to be garbage. An `Err` from here means the
    /// store or a downstream service is unhealthy, not that the user typed
    /// something wrong.
    pub async fn dispatch(&self, sender: &str, body: &str) -> anyhow::Result<String> {
        let mut words = body.split_whitespace();
        let cmd = words.next().unwrap_or("").to_lowercase();
        let args: Vec<String> = words.map(str::to_string).collect();

        self.audit.record_message(sender, body, &cmd, &args).await?;

        if cmd.is_empty() || cmd == "help" {
            return Ok(self.listing());
        }

        let Some(command) = self.commands.get(&cmd) else {
            return Ok(self.listing());
        };

        let admin = self.store.is_admin(sender).await?;
        if !admin && !SAFE_COMMANDS.contains(&cmd.as_str()) {
            info!("Denied {} for non-admin {}", cmd, sender);
            return Ok(Error::Permission.to_string());
        }

        let ctx = CommandContext {
            store: self.store.clone(),
            caller: sender.to_string(),
            admin,
        };

        match command.run(&ctx, &args).await {
            Ok(reply) => Ok(reply),
            Err(Error::Usage(msg)) => Ok(format!("{}\nUSAGE: {}", msg, command.usage())),
            Err(e @ Error::Domain(_)) | Err(e @ Error::Permission) => Ok(e.to_string()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::types::Subscriber;
    use herald_store::SqliteStore;

    struct Probe {
        name: &'static str,
        reply: Result<String>,
    }

    #[async_trait]
    impl Command for Probe {
        fn name(&self) -> &str {
            self.name
        }

        fn usage(&self) -> &str {
            "probe <arg>"
        }

        fn description(&self) -> &str {
            "Test probe"
        }

        async fn run(&self, _ctx: &CommandContext, _args: &[String]) -> Result<String> {
            match &self.reply {
                Ok(s) => Ok(s.clone()),
                Err(Error::Usage(m)) => Err(Error::Usage(m.clone())),
                Err(Error::Domain(m)) => Err(Error::Domain(m.clone())),
                Err(Error::Permission) => Err(Error::Permission),
                Err(Error::Store(m)) => Err(Error::Store(m.clone())),
                Err(_) => unreachable!(),
            }
        }
    }

    async fn dispatcher_with(probe: Probe) -> (Dispatcher, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut dispatcher = Dispatcher::new(store.clone(), store.clone());
        dispatcher.register(Arc::new(probe));
        (dispatcher, store)
    }

    async fn make_admin(store: &SqliteStore, handle: &str) {
        let mut sub = Subscriber::new(handle);
        sub.admin = true;
        store.upsert(&sub).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_command_replies_with_listing() {
        let (dispatcher, _store) = dispatcher_with(Probe {
            name: "probe",
            reply: Ok("ok".into()),
        })
        .await;

        let reply = dispatcher.dispatch("alice", "nonsense").await.unwrap();
        assert!(reply.contains("My available commands"));
        assert!(reply.contains("probe"));
    }

    #[tokio::test]
    async fn test_non_admin_gets_permission_rejection() {
        let (dispatcher, store) = dispatcher_with(Probe {
            name: "probe",
            reply: Ok("ran".into()),
        })
        .await;

        let reply = dispatcher.dispatch("alice", "probe x").await.unwrap();
        assert_eq!(reply, "Invalid permissions for that command.");

        make_admin(&store, "alice").await;
        let reply = dispatcher.dispatch("alice", "probe x").await.unwrap();
        assert_eq!(reply, "ran");
    }

    #[tokio::test]
    async fn test_safe_command_runs_without_admin() {
        let (dispatcher, _store) = dispatcher_with(Probe {
            name: "solve",
            reply: Ok("4".into()),
        })
        .await;

        let reply = dispatcher.dispatch("alice", "solve 2+2").await.unwrap();
        assert_eq!(reply, "4");
    }

    #[tokio::test]
    async fn test_usage_error_replies_with_usage_line() {
        let (dispatcher, store) = dispatcher_with(Probe {
            name: "probe",
            reply: Err(Error::Usage("wrong number of arguments".into())),
        })
        .await;
        make_admin(&store, "alice").await;

        let reply = dispatcher.dispatch("alice", "probe").await.unwrap();
        assert!(reply.contains("wrong number of arguments"));
        assert!(reply.contains("USAGE: probe <arg>"));
    }

    #[tokio::test]
    async fn test_domain_error_message_is_the_reply() {
        let (dispatcher, store) = dispatcher_with(Probe {
            name: "probe",
            reply: Err(Error::Domain("division by zero".into())),
        })
        .await;
        make_admin(&store, "alice").await;

        let reply = dispatcher.dispatch("alice", "probe").await.unwrap();
        assert_eq!(reply, "division by zero");
    }

    #[tokio::test]
    async fn test_operational_error_propagates() {
        let (dispatcher, store) = dispatcher_with(Probe {
            name: "probe",
            reply: Err(Error::Store("sqlite gone".into())),
        })
        .await;
        make_admin(&store, "alice").await;

        assert!(dispatcher.dispatch("alice", "probe").await.is_err());
    }

    #[tokio::test]
    async fn test_empty_and_help_reply_with_listing() {
        let (dispatcher, _store) = dispatcher_with(Probe {
            name: "probe",
            reply: Ok("ok".into()),
        })
        .await;

        assert!(
            dispatcher
                .dispatch("alice", "")
                .await
                .unwrap()
                .contains("My available commands")
        );
        assert!(
            dispatcher
                .dispatch("alice", "help")
                .await
                .unwrap()
                .contains("probe - Test probe")
        );
    }
}
