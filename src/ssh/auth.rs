//! Authentication method selection

use fleetwatch_shared::SshInfo;
use std::fmt;

/// A way of authenticating the SSH user
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMethod {
    Password(String),
}

impl AuthMethod {
    pub fn name(&self) -> &'static str {
        match self {
            AuthMethod::Password(_) => "password",
        }
    }
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::Password(_) => f.write_str("Password(***)"),
        }
    }
}

/// Build the ordered list of methods to try for a dial attempt.
///
/// Public-key authentication is not supported yet; when it is, it goes in
/// front of the password method when `uses_key` is set.
pub fn auth_methods(ssh: &SshInfo) -> Vec<AuthMethod> {
    let mut methods = Vec::new();

    if !ssh.password.is_empty() {
        methods.push(AuthMethod::Password(ssh.password.clone()));
    }

    methods
}
