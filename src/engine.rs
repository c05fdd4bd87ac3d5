use std::sync::Arc;
use tracing::{error, info, warn};

use crate::bucket::RateCounter;
use crate::error::EngineError;
use crate::lists::{ConfigRepository, ListMatcher, ListRepository};
use crate::network::parse_network;
use crate::types::{Attempt, Limits, ListEntry, ListKind, User};

/// Outcome of one dimension of the rate check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Check {
    Within,
    Exceeded(i64),
    /// Counter store unreachable; treated as a failed check.
    Unavailable,
}

impl Check {
    fn against(result: Result<i64, crate::error::CounterError>, limit: i64) -> Self {
        match result {
            Ok(count) if count <= limit => Check::Within,
            Ok(count) => Check::Exceeded(count),
            Err(_) => Check::Unavailable,
        }
    }
}

/// Decides whether a login attempt may proceed.
///
/// Whitelisted networks are always let through, blacklisted ones always
/// refused. Everything else is counted per ip, login and password; going
/// over any limit refuses the attempt and blacklists the ip.
pub struct Engine {
    lists: ListMatcher,
    counter: RateCounter,
    limits: Limits,
}

impl Engine {
    /// Reads the limits once from `config`; a missing limit is fatal.
    pub async fn new(
        lists: Arc<dyn ListRepository>,
        config: &dyn ConfigRepository,
        counter: RateCounter,
    ) -> Result<Self, EngineError> {
        let values = config
            .get_limits()
            .await
            .map_err(|e| EngineError::Config(format!("getting configuration error: {e}")))?;
        let limits = Limits::from_map(&values)?;
        info!(
            ip = limits.ip,
            login = limits.login,
            password = limits.password,
            "limits loaded"
        );
        Ok(Self::with_limits(lists, counter, limits))
    }

    pub fn with_limits(
        lists: Arc<dyn ListRepository>,
        counter: RateCounter,
        limits: Limits,
    ) -> Self {
        Self {
            lists: ListMatcher::new(lists),
            counter,
            limits,
        }
    }

    pub fn counter(&self) -> &RateCounter {
        &self.counter
    }

    pub async fn validate(&self, attempt: &Attempt) -> Result<bool, EngineError> {
        attempt.ensure_complete()?;

        let (white, black) = futures::join!(
            self.lists.contains_in_whitelist(&attempt.ip),
            self.lists.contains_in_blacklist(&attempt.ip),
        );
        if white {
            info!(ip = %attempt.ip, "User in white list");
            return Ok(true);
        }
        if black {
            info!(ip = %attempt.ip, "User in black list");
            return Ok(false);
        }

        // each future owns its slot; results are read only after the join
        let (ip, login, password) = futures::join!(
            self.counter.increment("ip", &attempt.ip),
            self.counter.increment("login", &attempt.login),
            self.counter.increment("password", &attempt.password),
        );
        let checks = [
            ("ip", Check::against(ip, self.limits.ip)),
            ("login", Check::against(login, self.limits.login)),
            ("password", Check::against(password, self.limits.password)),
        ];

        if checks.iter().all(|(_, check)| *check == Check::Within) {
            info!(login = %attempt.login, "Successful authorization");
            return Ok(true);
        }

        for (dimension, check) in &checks {
            match check {
                Check::Within => {}
                Check::Exceeded(count) => warn!(
                    dimension,
                    count,
                    login = %attempt.login,
                    ip = %attempt.ip,
                    "Anti-Fraud Protection: limit exceeded"
                ),
                Check::Unavailable => warn!(
                    dimension,
                    login = %attempt.login,
                    ip = %attempt.ip,
                    "Anti-Fraud Protection: counter unavailable"
                ),
            }
        }

        if checks
            .iter()
            .any(|(_, check)| matches!(check, Check::Exceeded(_)))
        {
            let entry = ListEntry::from_network(&attempt.ip);
            if let Err(e) = self.lists.add_to_blacklist(&entry).await {
                error!(ip = %attempt.ip, error = %e, "adding to black list error");
            }
        }

        Ok(false)
    }

    /// Resets the ip and login counters of `user`. The password counter is left alone.
    pub async fn clean_bucket(&self, user: &User) -> Result<(), EngineError> {
        user.ensure_complete()?;

        let (ip, login) = futures::join!(
            self.counter.clean("ip", &user.ip),
            self.counter.clean("login", &user.login),
        );
        if let Err(e) = &ip {
            error!(ip = %user.ip, error = %e, "clean bucket by IP");
        }
        if let Err(e) = &login {
            error!(login = %user.login, error = %e, "clean bucket by Login");
        }

        match (ip, login) {
            (Err(e), Err(_)) => Err(e.into()),
            _ => Ok(()),
        }
    }

    pub async fn add_to_whitelist(&self, entry: &ListEntry) -> Result<(), EngineError> {
        self.add(ListKind::White, entry).await
    }

    pub async fn add_to_blacklist(&self, entry: &ListEntry) -> Result<(), EngineError> {
        self.add(ListKind::Black, entry).await
    }

    pub async fn delete_from_whitelist(&self, entry: &ListEntry) -> Result<(), EngineError> {
        self.delete(ListKind::White, entry).await
    }

    pub async fn delete_from_blacklist(&self, entry: &ListEntry) -> Result<(), EngineError> {
        self.delete(ListKind::Black, entry).await
    }

    /// Bare addresses stored in the list.
    pub async fn list(&self, kind: ListKind) -> Result<Vec<String>, EngineError> {
        self.lists
            .repository()
            .list_all(kind)
            .await
            .map_err(|source| list_error(ListOp::Get.name(kind), source))
    }

    /// Whether an entry with exactly this address is stored in the list.
    pub async fn is_listed(&self, kind: ListKind, entry: &ListEntry) -> Result<bool, EngineError> {
        entry.ensure_complete()?;
        let entry = entry.clone().normalized();
        self.lists
            .repository()
            .exists(kind, &entry)
            .await
            .map_err(|source| list_error(ListOp::Check.name(kind), source))
    }

    async fn add(&self, kind: ListKind, entry: &ListEntry) -> Result<(), EngineError> {
        entry.ensure_complete()?;
        let entry = entry.clone().normalized();
        let op = ListOp::Add.name(kind);

        if let Err(e) = parse_network(&entry.to_string()) {
            error!(ip = %entry, error = %e, "{op} error");
            return Err(EngineError::InvalidNetwork(entry.to_string()));
        }

        info!(ip = %entry, "{op}");
        self.lists
            .add(kind, &entry)
            .await
            .map_err(|source| list_error(op, source))
    }

    async fn delete(&self, kind: ListKind, entry: &ListEntry) -> Result<(), EngineError> {
        entry.ensure_complete()?;
        let entry = entry.clone().normalized();
        let op = ListOp::Delete.name(kind);

        info!(ip = %entry, "{op}");
        self.lists
            .delete(kind, &entry)
            .await
            .map_err(|source| list_error(op, source))
    }
}

/// List administration operations, named as they appear in error messages.
#[derive(Clone, Copy)]
enum ListOp {
    Add,
    Delete,
    Get,
    Check,
}

impl ListOp {
    fn name(self, kind: ListKind) -> &'static str {
        match (self, kind) {
            (ListOp::Add, ListKind::White) => "add to white list",
            (ListOp::Add, ListKind::Black) => "add to black list",
            (ListOp::Delete, ListKind::White) => "delete from white list",
            (ListOp::Delete, ListKind::Black) => "delete from black list",
            (ListOp::Get, ListKind::White) => "get white list",
            (ListOp::Get, ListKind::Black) => "get black list",
            (ListOp::Check, ListKind::White) => "check white list",
            (ListOp::Check, ListKind::Black) => "check black list",
        }
    }
}

fn list_error(op: &'static str, source: crate::error::StoreError) -> EngineError {
    error!(error = %source, "{op} error");
    EngineError::List { op, source }
}
