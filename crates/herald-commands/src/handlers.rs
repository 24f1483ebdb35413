//! Subscriber management handlers
//!
//! Admin-only except `mute`/`unmute`, which are self-service. Handlers
//! never print their own usage text; they raise a usage error and the
//! dispatcher renders it.

use crate::dispatcher::{Command, CommandContext};
use async_trait::async_trait;
use herald_core::error::{Error, Result};
use herald_core::types::{Mute, RepoWatch, SaleWatch, Subscriber};

fn usage_err() -> Error {
    Error::Usage("wrong number of arguments".to_string())
}

async fn load(ctx: &CommandContext, handle: &str) -> Result<Subscriber> {
    ctx.store
        .get(handle)
        .await?
        .ok_or_else(|| Error::Domain(format!("No subscriber named {handle}")))
}

/// `add_sub <handle> [same-code...]`
pub struct AddSub;

#[async_trait]
impl Command for AddSub {
    fn name(&self) -> &str {
        "add_sub"
    }

    fn usage(&self) -> &str {
        "add_sub <handle> [same-code...]"
    }

    fn description(&self) -> &str {
        "Subscribe a user, optionally with SAME weather codes"
    }

    async fn run(&self, ctx: &CommandContext, args: &[String]) -> Result<String> {
        let [handle, codes @ ..] = args else {
            return Err(usage_err());
        };

        // Re-adding merges codes instead of wiping the record
        let mut sub = ctx
            .store
            .get(handle)
            .await?
            .unwrap_or_else(|| Subscriber::new(handle));
        for code in codes {
            sub.same_codes.insert(code.clone());
        }
        ctx.store.upsert(&sub).await?;
        Ok(format!("Subscribed {handle}"))
    }
}

/// `del_sub <handle>`
pub struct DelSub;

#[async_trait]
impl Command for DelSub {
    fn name(&self) -> &str {
        "del_sub"
    }

    fn usage(&self) -> &str {
        "del_sub <handle>"
    }

    fn description(&self) -> &str {
        "Remove a subscriber and all their watches"
    }

    async fn run(&self, ctx: &CommandContext, args: &[String]) -> Result<String> {
        let [handle] = args else {
            return Err(usage_err());
        };
        if ctx.store.delete(handle).await? {
            Ok(format!("Unsubscribed {handle}"))
        } else {
            Err(Error::Domain(format!("No subscriber named {handle}")))
        }
    }
}

/// `severity <handle> [level...]` - empty levels clear the filter
pub struct Severity;

#[async_trait]
impl Command for Severity {
    fn name(&self) -> &str {
        "severity"
    }

    fn usage(&self) -> &str {
        "severity <handle> [level...]"
    }

    fn description(&self) -> &str {
        "Set a subscriber's weather severity filter (none = all severities)"
    }

    async fn run(&self, ctx: &CommandContext, args: &[String]) -> Result<String> {
        let [handle, levels @ ..] = args else {
            return Err(usage_err());
        };
        let mut sub = load(ctx, handle).await?;
        sub.severities = levels.iter().map(|l| l.to_lowercase()).collect();
        ctx.store.upsert(&sub).await?;

        if sub.severities.is_empty() {
            Ok(format!("{handle} now receives all severities"))
        } else {
            Ok(format!(
                "{handle} now receives: {}",
                sub.severities
                    .iter()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        }
    }
}

/// `gitwatch <handle> <owner> <repo>`
pub struct GitWatch;

#[async_trait]
impl Command for GitWatch {
    fn name(&self) -> &str {
        "gitwatch"
    }

    fn usage(&self) -> &str {
        "gitwatch <handle> <owner> <repo>"
    }

    fn description(&self) -> &str {
        "Notify a subscriber about new commits on a repository"
    }

    async fn run(&self, ctx: &CommandContext, args: &[String]) -> Result<String> {
        let [handle, owner, repo] = args else {
            return Err(usage_err());
        };
        let mut sub = load(ctx, handle).await?;
        let watch = RepoWatch {
            owner: owner.clone(),
            repo: repo.clone(),
        };
        let label = watch.to_string();
        sub.repos.insert(watch);
        ctx.store.upsert(&sub).await?;
        Ok(format!("Watching {label} for {handle}"))
    }
}

/// `delgit <handle> <owner> <repo>`
pub struct DelGit;

#[async_trait]
impl Command for DelGit {
    fn name(&self) -> &str {
        "delgit"
    }

    fn usage(&self) -> &str {
        "delgit <handle> <owner> <repo>"
    }

    fn description(&self) -> &str {
        "Stop watching a repository for a subscriber"
    }

    async fn run(&self, ctx: &CommandContext, args: &[String]) -> Result<String> {
        let [handle, owner, repo] = args else {
            return Err(usage_err());
        };
        let mut sub = load(ctx, handle).await?;
        let watch = RepoWatch {
            owner: owner.clone(),
            repo: repo.clone(),
        };
        if !sub.repos.remove(&watch) {
            return Err(Error::Domain(format!(
                "{handle} is not watching {watch}"
            )));
        }
        ctx.store.upsert(&sub).await?;
        Ok(format!("Stopped watching {watch} for {handle}"))
    }
}

/// `salewatch <handle> <name> <url> <price> [discount]`
pub struct SaleWatchCmd;

#[async_trait]
impl Command for SaleWatchCmd {
    fn name(&self) -> &str {
        "salewatch"
    }

    fn usage(&self) -> &str {
        "salewatch <handle> <name> <url> <price> [discount]"
    }

    fn description(&self) -> &str {
        "Watch a storefront listing until it drops to the target price"
    }

    async fn run(&self, ctx: &CommandContext, args: &[String]) -> Result<String> {
        let (required, rest) = match args {
            [handle, name, url, price, rest @ ..] if rest.len() <= 1 => {
                ((handle, name, url, price), rest)
            }
            _ => return Err(usage_err()),
        };
        let (handle, name, url, price) = required;

        let price: f64 = price
            .parse()
            .map_err(|_| Error::Usage(format!("{price} is not a price")))?;
        let discount = match rest.first().map(String::as_str) {
            None => false,
            Some("discount") => true,
            Some(other) => {
                return Err(Error::Usage(format!("unexpected argument {other}")));
            }
        };

        let mut sub = load(ctx, handle).await?;
        sub.add_sale_watch(SaleWatch {
            name: name.clone(),
            url: url.clone(),
            price,
            discount,
        });
        ctx.store.upsert(&sub).await?;
        Ok(format!("Watching {name} for {handle} at <= {price:.2}"))
    }
}

/// `delsale <handle> <name>`
pub struct DelSale;

#[async_trait]
impl Command for DelSale {
    fn name(&self) -> &str {
        "delsale"
    }

    fn usage(&self) -> &str {
        "delsale <handle> <name>"
    }

    fn description(&self) -> &str {
        "Remove a price watch"
    }

    async fn run(&self, ctx: &CommandContext, args: &[String]) -> Result<String> {
        let [handle, name] = args else {
            return Err(usage_err());
        };
        if ctx.store.pull_sale_watch(handle, name).await? {
            Ok(format!("Removed watch {name} for {handle}"))
        } else {
            Err(Error::Domain(format!("{handle} has no watch named {name}")))
        }
    }
}

/// `promote <handle>`
pub struct Promote;

#[async_trait]
impl Command for Promote {
    fn name(&self) -> &str {
        "promote"
    }

    fn usage(&self) -> &str {
        "promote <handle>"
    }

    fn description(&self) -> &str {
        "Grant a subscriber the admin flag"
    }

    async fn run(&self, ctx: &CommandContext, args: &[String]) -> Result<String> {
        let [handle] = args else {
            return Err(usage_err());
        };
        let mut sub = load(ctx, handle).await?;
        sub.admin = true;
        ctx.store.upsert(&sub).await?;
        Ok(format!("{handle} is now an admin"))
    }
}

/// `mute <hours>` - self-service, requires being a subscriber
pub struct MuteCmd;

#[async_trait]
impl Command for MuteCmd {
    fn name(&self) -> &str {
        "mute"
    }

    fn usage(&self) -> &str {
        "mute <hours>"
    }

    fn description(&self) -> &str {
        "Silence your alert notifications for a while"
    }

    async fn run(&self, ctx: &CommandContext, args: &[String]) -> Result<String> {
        let [hours] = args else {
            return Err(usage_err());
        };
        let hours: i64 = hours
            .parse()
            .map_err(|_| Error::Usage(format!("{hours} is not a number of hours")))?;
        if hours <= 0 {
            return Err(Error::Usage("hours must be positive".to_string()));
        }

        if !ctx
            .store
            .set_mute(&ctx.caller, Some(Mute::for_hours(hours)))
            .await?
        {
            return Err(Error::Domain("You are not subscribed.".to_string()));
        }
        Ok(format!("Muted for {hours} hour(s)."))
    }
}

/// `unmute`
pub struct UnmuteCmd;

#[async_trait]
impl Command for UnmuteCmd {
    fn name(&self) -> &str {
        "unmute"
    }

    fn usage(&self) -> &str {
        "unmute"
    }

    fn description(&self) -> &str {
        "Lift your mute early"
    }

    async fn run(&self, ctx: &CommandContext, _args: &[String]) -> Result<String> {
        if !ctx.store.set_mute(&ctx.caller, None).await? {
            return Err(Error::Domain("You are not subscribed.".to_string()));
        }
        Ok("Unmuted.".to_string())
    }
}
