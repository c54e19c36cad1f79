//! Input validation shared by bulk import and interactive server entry.

use regex::Regex;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;
use thiserror::Error;

/// Characters that could alter a command line if a domain were passed to a shell.
const SHELL_METACHARACTERS: &[char] = &[';', '|', '&', '`', '$', '(', ')'];

const MAX_DOMAIN_LENGTH: usize = 253;
const MAX_LABEL_LENGTH: usize = 63;

static HOSTNAME_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").expect("valid hostname regex")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("domain is empty")]
    Empty,
    #[error("domain is {0} characters long, the limit is 253")]
    TooLong(usize),
    #[error("domain contains forbidden character {0:?}")]
    ForbiddenCharacter(char),
    #[error("domain must not start or end with '.' or '-'")]
    BadBoundary,
    #[error("domain contains an empty label")]
    EmptyLabel,
    #[error("label {0:?} is longer than 63 characters")]
    LabelTooLong(String),
    #[error("label {0:?} must start and end with a letter or digit")]
    BadLabelBoundary(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0:?} is not an IPv4 address, IPv6 address or hostname")]
pub struct InvalidServer(pub String);

/// Checks that `domain` is a well-formed name that is safe to hand to the
/// query collaborator. IPv4 literals pass as domains.
pub fn validate_domain(domain: &str) -> Result<(), DomainError> {
    if domain.is_empty() {
        return Err(DomainError::Empty);
    }
    if let Some(c) = domain
        .chars()
        .find(|c| SHELL_METACHARACTERS.contains(c) || c.is_whitespace() || c.is_control())
    {
        return Err(DomainError::ForbiddenCharacter(c));
    }
    let length = domain.chars().count();
    if length > MAX_DOMAIN_LENGTH {
        return Err(DomainError::TooLong(length));
    }
    if domain.starts_with(['.', '-']) || domain.ends_with(['.', '-']) {
        return Err(DomainError::BadBoundary);
    }
    if domain.contains("..") {
        return Err(DomainError::EmptyLabel);
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(DomainError::EmptyLabel);
        }
        if label.chars().count() > MAX_LABEL_LENGTH {
            return Err(DomainError::LabelTooLong(label.to_string()));
        }
        let starts_ok = label.chars().next().is_some_and(|c| c.is_ascii_alphanumeric());
        let ends_ok = label.chars().last().is_some_and(|c| c.is_ascii_alphanumeric());
        if !starts_ok || !ends_ok {
            return Err(DomainError::BadLabelBoundary(label.to_string()));
        }
    }
    Ok(())
}

/// Accepts an IPv4 address, an IPv6 address or an RFC 1123 hostname.
pub fn validate_server(server: &str) -> Result<(), InvalidServer> {
    if server.parse::<Ipv4Addr>().is_ok() || server.parse::<Ipv6Addr>().is_ok() {
        return Ok(());
    }
    if is_rfc1123_hostname(server) {
        Ok(())
    } else {
        Err(InvalidServer(server.to_string()))
    }
}

fn is_rfc1123_hostname(host: &str) -> bool {
    let host = host.strip_suffix('.').unwrap_or(host);
    !host.is_empty()
        && host.len() <= MAX_DOMAIN_LENGTH
        && host.split('.').all(|label| HOSTNAME_LABEL.is_match(label))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_domains() {
        for domain in ["example.com", "a.b.c.example.org", "xn--bcher-kva.ch", "localhost", "1.2.3.4"] {
            assert_eq!(validate_domain(domain), Ok(()), "{domain}");
        }
    }

    #[test]
    fn rejects_shell_metacharacters() {
        for domain in ["a;b.com", "a|b.com", "a&b.com", "a`b.com", "$(x).com", "a(b).com"] {
            assert!(
                matches!(validate_domain(domain), Err(DomainError::ForbiddenCharacter(_))),
                "{domain}"
            );
        }
    }

    #[test]
    fn rejects_malformed_structure() {
        assert_eq!(validate_domain(""), Err(DomainError::Empty));
        assert_eq!(validate_domain(".example.com"), Err(DomainError::BadBoundary));
        assert_eq!(validate_domain("example.com."), Err(DomainError::BadBoundary));
        assert_eq!(validate_domain("-example.com"), Err(DomainError::BadBoundary));
        assert_eq!(validate_domain("bad..domain"), Err(DomainError::EmptyLabel));
        assert!(matches!(
            validate_domain("foo.-bar.com"),
            Err(DomainError::BadLabelBoundary(_))
        ));
        assert!(matches!(
            validate_domain("_dmarc.example.com"),
            Err(DomainError::BadLabelBoundary(_))
        ));
    }

    #[test]
    fn enforces_length_limits() {
        let label = "a".repeat(64);
        assert!(matches!(
            validate_domain(&format!("{label}.com")),
            Err(DomainError::LabelTooLong(_))
        ));
        assert_eq!(validate_domain(&format!("{}.com", "a".repeat(63))), Ok(()));

        let long = vec!["abcdefghi"; 26].join(".");
        assert_eq!(long.len(), 259);
        assert_eq!(validate_domain(&long), Err(DomainError::TooLong(259)));
    }

    #[test]
    fn validates_servers() {
        assert!(validate_server("8.8.8.8").is_ok());
        assert!(validate_server("2001:4860:4860::8888").is_ok());
        assert!(validate_server("dns.google").is_ok());
        assert!(validate_server("one.one.one.one.").is_ok());
        assert!(validate_server("not a server").is_err());
        assert!(validate_server("-bad.example").is_err());
        assert!(validate_server("").is_err());
        assert!(validate_server("8.8.8.8;rm").is_err());
    }
}
