//! Allowlist access decision.
//!
//! Matching is exact string equality on the IP literal: no CIDR ranges,
//! no canonicalisation (`::1` and `0:0:0:0:0:0:0:1` are different entries).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// No allowlist configured; the caller's IP is echoed back.
    Open { ip: String },
    Grant { ip: String },
    /// Carries the whole allowlist so operators can see why a caller was
    /// turned away. Unauthenticated callers see it too.
    Deny { ip: String, allowed: Vec<String> },
}

impl Decision {
    pub fn is_granted(&self) -> bool {
        !matches!(self, Decision::Deny { .. })
    }

    pub fn body(&self) -> String {
        match self {
            Decision::Open { ip } => ip.clone(),
            Decision::Grant { ip } => {
                format!("Access granted. Your source IP ({ip}) matches an allowed IP.\n")
            }
            Decision::Deny { ip, allowed } => format!(
                "Access denied. Your source IP ({ip}) doesn't match the allowed IPs ({})\n",
                allowed.join(", ")
            ),
        }
    }
}

impl IntoResponse for Decision {
    fn into_response(self) -> Response {
        let status = if self.is_granted() {
            StatusCode::OK
        } else {
            StatusCode::UNAUTHORIZED
        };
        (status, self.body()).into_response()
    }
}

pub fn decide(ip: &str, allowed: Vec<String>) -> Decision {
    if allowed.is_empty() {
        return Decision::Open { ip: ip.to_owned() };
    }
    if allowed.iter().any(|a| a == ip) {
        Decision::Grant { ip: ip.to_owned() }
    } else {
        Decision::Deny {
            ip: ip.to_owned(),
            allowed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(ips: &[&str]) -> Vec<String> {
        ips.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_allowlist_is_open() {
        let d = decide("203.0.113.5", vec![]);
        assert_eq!(d, Decision::Open { ip: "203.0.113.5".into() });
        assert_eq!(d.body(), "203.0.113.5");
        assert!(d.is_granted());
    }

    #[test]
    fn exact_match_is_granted() {
        let d = decide("203.0.113.5", list(&["198.51.100.1", "203.0.113.5"]));
        assert!(d.is_granted());
        assert_eq!(
            d.body(),
            "Access granted. Your source IP (203.0.113.5) matches an allowed IP.\n"
        );
    }

    #[test]
    fn non_member_is_denied_with_allowlist_in_body() {
        let d = decide("198.51.100.1", list(&["203.0.113.5", "2001:db8::1"]));
        assert!(!d.is_granted());
        assert_eq!(
            d.body(),
            "Access denied. Your source IP (198.51.100.1) doesn't match the allowed IPs (203.0.113.5, 2001:db8::1)\n"
        );
    }

    #[test]
    fn no_normalisation_of_equivalent_literals() {
        let d = decide("0:0:0:0:0:0:0:1", list(&["::1"]));
        assert!(!d.is_granted());
    }

    #[test]
    fn no_prefix_matching() {
        let d = decide("203.0.113.50", list(&["203.0.113.5"]));
        assert!(!d.is_granted());
    }

    #[test]
    fn deny_maps_to_401() {
        let resp = decide("198.51.100.1", list(&["203.0.113.5"])).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
