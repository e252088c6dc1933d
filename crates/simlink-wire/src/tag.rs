//! Frame tags.
//!
//! The tag is the single leading byte of every frame and selects the field
//! layout that follows. Tags 1, 3, 4 and 5 travel controller→simulation;
//! tags 2, 3 and 6 travel simulation→controller; tag 0 is reserved for the
//! controller's own client bookkeeping and never reaches the dispatcher in
//! a well-behaved session.

/// Reserved: controller-side client registration. No payload.
pub const NEW_CLIENT: u8 = 0;

/// Controller→simulation message injection.
pub const SEND: u8 = 1;

/// Simulation→controller message delivery.
pub const RECV: u8 = 2;

/// Endpoint teardown, either direction.
pub const DISCONNECT: u8 = 3;

/// Controller asks for a property value.
pub const PROPGET: u8 = 4;

/// Controller stores a property value.
pub const PROPSET: u8 = 5;

/// Simulation answers a PROPGET.
pub const PROPVAL: u8 = 6;

/// Destination id meaning "every known endpoint".
///
/// The core never fans out; interpretation belongs entirely to the host
/// hook that receives the delivery.
pub const BROADCAST: u32 = 0;

/// Returns a human-readable name for a tag byte.
pub fn tag_name(tag: u8) -> &'static str {
    match tag {
        NEW_CLIENT => "NEW_CLIENT",
        SEND => "SEND",
        RECV => "RECV",
        DISCONNECT => "DISCONNECT",
        PROPGET => "PROPGET",
        PROPSET => "PROPSET",
        PROPVAL => "PROPVAL",
        _ => "UNKNOWN",
    }
}

/// Returns true if the tag travels controller→simulation, i.e. is one the
/// simulation-side dispatcher acts on.
pub fn is_simulation_bound(tag: u8) -> bool {
    matches!(tag, SEND | DISCONNECT | PROPGET | PROPSET)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_names_cover_all_known_tags() {
        for tag in 0..=6u8 {
            assert_ne!(tag_name(tag), "UNKNOWN");
        }
        assert_eq!(tag_name(7), "UNKNOWN");
        assert_eq!(tag_name(0xFF), "UNKNOWN");
    }

    #[test]
    fn dispatcher_tags() {
        assert!(is_simulation_bound(SEND));
        assert!(is_simulation_bound(DISCONNECT));
        assert!(is_simulation_bound(PROPGET));
        assert!(is_simulation_bound(PROPSET));
        assert!(!is_simulation_bound(NEW_CLIENT));
        assert!(!is_simulation_bound(RECV));
        assert!(!is_simulation_bound(PROPVAL));
    }
}
