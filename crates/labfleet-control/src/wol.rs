//! Wake-on-LAN magic packet construction and broadcast.
//!
//! A magic packet is 6 bytes of `0xFF` followed by 16 repetitions of the
//! target's 6-byte MAC address, sent as a UDP broadcast to port 9.

use std::io;

use thiserror::Error;
use tokio::net::UdpSocket;

/// Size of a magic packet in bytes.
const PACKET_LEN: usize = 6 + 16 * 6;

/// Errors from building or sending a Wake-on-LAN packet.
#[derive(Debug, Error)]
pub enum WolError {
    /// The MAC address could not be parsed.
    #[error("invalid MAC address: {0}")]
    InvalidMac(String),

    /// Sending the UDP broadcast failed.
    #[error("failed to send packet: {0}")]
    Io(#[from] io::Error),
}

/// Parse a MAC address with `:` or `-` separators (or none) into bytes.
fn parse_mac(mac: &str) -> Result<[u8; 6], WolError> {
    let hex: String = mac.chars().filter(|c| *c != ':' && *c != '-').collect();
    if hex.len() != 12 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(WolError::InvalidMac(mac.to_string()));
    }

    let mut bytes = [0u8; 6];
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        let pair = std::str::from_utf8(chunk).map_err(|_| WolError::InvalidMac(mac.to_string()))?;
        bytes[i] =
            u8::from_str_radix(pair, 16).map_err(|_| WolError::InvalidMac(mac.to_string()))?;
    }
    Ok(bytes)
}

/// Build the 102-byte magic packet for the given MAC address.
///
/// # Errors
///
/// Returns [`WolError::InvalidMac`] if the address does not parse.
pub fn magic_packet(mac: &str) -> Result<[u8; PACKET_LEN], WolError> {
    let mac_bytes = parse_mac(mac)?;

    let mut packet = [0xFFu8; PACKET_LEN];
    for rep in 0..16 {
        let offset = 6 + rep * 6;
        packet[offset..offset + 6].copy_from_slice(&mac_bytes);
    }
    Ok(packet)
}

/// Send a Wake-on-LAN magic packet for the given MAC address as a UDP
/// broadcast to port 9.
///
/// # Errors
///
/// Returns an error if the MAC is invalid or the broadcast cannot be sent.
pub async fn send_magic_packet(mac: &str) -> Result<(), WolError> {
    let packet = magic_packet(mac)?;

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.set_broadcast(true)?;
    socket.send_to(&packet, ("255.255.255.255", 9)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_layout() {
        let packet = magic_packet("00:11:22:33:44:55").unwrap();
        assert_eq!(packet.len(), 102);
        assert!(packet[..6].iter().all(|b| *b == 0xFF));

        let mac = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];
        for rep in 0..16 {
            let offset = 6 + rep * 6;
            assert_eq!(&packet[offset..offset + 6], &mac);
        }
    }

    #[test]
    fn accepts_dashes_and_bare_hex() {
        assert!(magic_packet("00-11-22-33-44-55").is_ok());
        assert!(magic_packet("001122334455").is_ok());
        assert_eq!(
            magic_packet("AA:BB:CC:DD:EE:FF").unwrap()[6..12],
            [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]
        );
    }

    #[test]
    fn rejects_malformed() {
        assert!(matches!(magic_packet(""), Err(WolError::InvalidMac(_))));
        assert!(matches!(
            magic_packet("00:11:22:33:44"),
            Err(WolError::InvalidMac(_))
        ));
        assert!(matches!(
            magic_packet("00:11:22:33:44:GG"),
            Err(WolError::InvalidMac(_))
        ));
    }

    #[tokio::test]
    async fn send_rejects_bad_mac_before_binding() {
        let err = send_magic_packet("nope").await.unwrap_err();
        assert!(matches!(err, WolError::InvalidMac(_)));
    }
}
