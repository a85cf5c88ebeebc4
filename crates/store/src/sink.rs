use uuid::Uuid;

/// Side channel announcing that a policy identifier now exists.
///
/// The transport layer implements this to publish policy availability to
/// other components. The store announces after every successful set and for
/// every record seeded at bootstrap; it never announces removals.
pub trait ExistenceSink {
	fn announce(&mut self, id: Uuid);
}
