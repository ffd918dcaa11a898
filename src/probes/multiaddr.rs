//! Host/port extraction from layered multiaddresses.

use thiserror::Error;

/// Errors from multiaddress parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressParseError {
    /// The address does not have enough `/`-separated segments.
    #[error("invalid multiaddress format: {0}")]
    Malformed(String),

    /// No host or no tcp port segment was present.
    #[error("could not extract host and port from address")]
    MissingParts,

    /// The tcp segment's port is not a valid u16.
    #[error("invalid port: {0}")]
    InvalidPort(String),
}

/// Extracts `(host, port)` from a multiaddress of the form
/// `/<family>/<host>/tcp/<port>/...` where the family is one of
/// `dns`, `dns4`, `ip4`, `ip6`.
pub fn parse_host_port(address: &str) -> Result<(String, u16), AddressParseError> {
    let parts: Vec<&str> = address.split('/').collect();
    if parts.len() < 5 {
        return Err(AddressParseError::Malformed(address.to_string()));
    }

    let mut host = None;
    let mut port = None;
    for i in 0..parts.len() - 1 {
        match parts[i] {
            "dns" | "dns4" | "ip4" | "ip6" => host = Some(parts[i + 1]),
            "tcp" => port = Some(parts[i + 1]),
            _ => {}
        }
    }

    let host = host.filter(|h| !h.is_empty()).ok_or(AddressParseError::MissingParts)?;
    let port = port.filter(|p| !p.is_empty()).ok_or(AddressParseError::MissingParts)?;
    let port =
        port.parse::<u16>().map_err(|_| AddressParseError::InvalidPort(port.to_string()))?;

    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dns_multiaddr() {
        let (host, port) =
            parse_host_port("/dns/bootstrap1.example.org/tcp/21888/p2p/QmFoo").unwrap();
        assert_eq!(host, "bootstrap1.example.org");
        assert_eq!(port, 21888);
    }

    #[test]
    fn parses_ip4_multiaddr() {
        let (host, port) =
            parse_host_port("/ip4/65.108.211.187/tcp/21888/p2p/12D3KooW").unwrap();
        assert_eq!(host, "65.108.211.187");
        assert_eq!(port, 21888);
    }

    #[test]
    fn parses_ip6_multiaddr() {
        let (host, port) = parse_host_port("/ip6/2001:db8::1/tcp/21888/p2p/QmBar").unwrap();
        assert_eq!(host, "2001:db8::1");
        assert_eq!(port, 21888);
    }

    #[test]
    fn rejects_short_address() {
        assert_eq!(
            parse_host_port("invalid"),
            Err(AddressParseError::Malformed("invalid".to_string())),
        );
    }

    #[test]
    fn rejects_address_without_tcp_segment() {
        assert_eq!(
            parse_host_port("/dns/example.org/udp/21888/p2p/QmFoo"),
            Err(AddressParseError::MissingParts),
        );
    }

    #[test]
    fn rejects_out_of_range_port() {
        assert_eq!(
            parse_host_port("/dns/example.org/tcp/99999/p2p/QmFoo"),
            Err(AddressParseError::InvalidPort("99999".to_string())),
        );
    }
}
