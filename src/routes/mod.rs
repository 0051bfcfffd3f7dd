/// Router Module Index
///
/// Routing is split by the dashboard namespace each module serves. Access to the
/// namespaces is enforced once, by the route guard layered over the merged
/// router; the modules only declare paths.

/// Auth pages and `/api` endpoints (outside the role namespaces).
pub mod public;

/// `/dashboard/super/*`: platform operator pages.
pub mod super_user;

/// `/dashboard/admin/*`: organization admin pages (super users may enter).
pub mod admin;

/// `/dashboard/employee/*`: employee pages.
pub mod employee;
