//! Navigation guard.

/// Route all unauthenticated traffic lands on.
pub const PUBLIC_ROOT: &str = "/";
/// Login screen route.
pub const LOGIN_ROUTE: &str = "/login";
/// Default protected route.
pub const PROTECTED_ROOT: &str = "/protected";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Stay,
    Redirect(String),
}

impl Navigation {
    /// Path the kiosk ends up on when `requested` was asked for.
    pub fn resolve<'a>(&'a self, requested: &'a str) -> &'a str {
        match self {
            Navigation::Stay => requested,
            Navigation::Redirect(to) => to,
        }
    }
}

/// Decides redirects from the requested path and whether a valid session exists.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    /// Protected path prefixes; the first one is where authenticated users land.
    protected: Vec<String>,
}

impl RouteGuard {
    pub fn new(protected: Vec<String>) -> Self {
        let protected: Vec<String> = protected
            .into_iter()
            .map(|p| normalize(&p))
            .filter(|p| p != PUBLIC_ROOT)
            .collect();
        if protected.is_empty() {
            return Self::default();
        }
        Self { protected }
    }

    pub fn protected_root(&self) -> &str {
        &self.protected[0]
    }

    pub fn is_protected(&self, path: &str) -> bool {
        let path = normalize(path);
        self.protected.iter().any(|p| {
            path == *p || path.strip_prefix(p.as_str()).is_some_and(|rest| rest.starts_with('/'))
        })
    }

    fn is_known(&self, path: &str) -> bool {
        path == PUBLIC_ROOT || path == LOGIN_ROUTE || self.is_protected(path)
    }

    /// Check one navigation request.
    pub fn check(&self, requested: &str, authenticated: bool) -> Navigation {
        let path = normalize(requested);
        // Unknown routes fall through to the public root.
        let target = if self.is_known(&path) { path } else { PUBLIC_ROOT.to_string() };

        let protected = self.is_protected(&target);
        let target = if !authenticated && protected {
            PUBLIC_ROOT.to_string()
        } else if authenticated && !protected {
            self.protected_root().to_string()
        } else {
            target
        };

        if target == requested {
            Navigation::Stay
        } else {
            Navigation::Redirect(target)
        }
    }
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self {
            protected: vec![PROTECTED_ROOT.to_string()],
        }
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim();
    let trimmed = trimmed.split(['?', '#']).next().unwrap_or_default();
    let mut out = String::with_capacity(trimmed.len() + 1);
    if !trimmed.starts_with('/') {
        out.push('/');
    }
    out.push_str(trimmed);
    while out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}
