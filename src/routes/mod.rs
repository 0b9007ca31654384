/// Router Module Index
///
/// Routes are grouped by the access they require. Each group gets its guard as a
/// `route_layer` in `create_router`, so a handler can never be mounted without the
/// check its group implies. Groups share paths (e.g. GET and PUT on one resource) and
/// are merged per method.

/// No credentials required.
pub mod public;

/// Any valid session token.
pub mod authenticated;

/// Admin or staff role: the message inbox.
pub mod staff;

/// Admin role only.
pub mod admin;
