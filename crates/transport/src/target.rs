//! Target host identity

/// The `(host, hostname, fqdn)` triple describing one target.
///
/// `host` is what the user passed and what the exec/copy commands receive.
/// `hostname` drops any `user@` prefix and IPv6 brackets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetHost {
    host: String,
    hostname: String,
    fqdn: String,
}

impl TargetHost {
    pub fn new(host: impl Into<String>) -> Self {
        let host = host.into();
        let hostname = strip_host(&host).to_string();
        Self {
            fqdn: hostname.clone(),
            hostname,
            host,
        }
    }

    /// Override the fully qualified name.
    pub fn with_fqdn(mut self, fqdn: impl Into<String>) -> Self {
        self.fqdn = fqdn.into();
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn fqdn(&self) -> &str {
        &self.fqdn
    }

    /// Host as it must appear before `:` in a copy destination.
    ///
    /// Bare IPv6 addresses are bracketed so the path separator stays unambiguous.
    pub fn copy_host(&self) -> String {
        let (user, rest) = match self.host.split_once('@') {
            Some((user, rest)) => (Some(user), rest),
            None => (None, self.host.as_str()),
        };
        let rest = if rest.contains(':') && !rest.starts_with('[') {
            format!("[{rest}]")
        } else {
            rest.to_string()
        };
        match user {
            Some(user) => format!("{user}@{rest}"),
            None => rest,
        }
    }

    /// Environment exported to every script about the target.
    pub fn env(&self) -> [(&'static str, String); 3] {
        [
            ("__target_host", self.host.clone()),
            ("__target_hostname", self.hostname.clone()),
            ("__target_fqdn", self.fqdn.clone()),
        ]
    }
}

fn strip_host(host: &str) -> &str {
    let host = host.rsplit_once('@').map_or(host, |(_, rest)| rest);
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}
