//! SMART on FHIR clinical scope parsing.
//!
//! A clinical scope grants access to resources inside one compartment:
//!
//! ```text
//! <compartment>/<resource>.<operation>
//! ```
//!
//! - **Compartment**: letters only, e.g. `patient`, `user`, `system`. An empty
//!   compartment is accepted and kept as its own value.
//! - **Resource**: a resource type name (letters only) or `*` for all types
//! - **Operation**: one of
//!   - `read` (SMART v1) - read and search
//!   - `write` (SMART v1) - create, update and delete
//!   - `*` - all permissions
//!   - an ordered run of `cruds` letters (SMART v2), each letter optional
//!
//! The v1 literals are checked before the v2 letter run, so `read` never gets
//! interpreted as the letters `r`, `e`, `a`, `d`.
//!
//! # Examples
//!
//! ```
//! use octofhir_auth::smart::scopes::{ClinicalScope, ClinicalScopes};
//!
//! let scope = ClinicalScope::parse("patient/Observation.rs").unwrap();
//! assert_eq!(scope.compartment(), "patient");
//! assert!(scope.can_read());
//! assert!(scope.can_search());
//! assert!(!scope.can_create());
//!
//! // Non-clinical scopes are skipped when parsing a whole grant.
//! let scopes = ClinicalScopes::parse("openid profile patient/*.read");
//! assert_eq!(scopes.len(), 1);
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::AuthError;

// ============================================================================
// Error Types
// ============================================================================

/// Reasons a token is rejected by the clinical scope grammar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    /// The token is not shaped like `compartment/resource.operation`.
    #[error("Invalid scope format")]
    InvalidFormat,

    /// The compartment contains something other than letters.
    #[error("Invalid compartment: {0}")]
    InvalidCompartment(String),

    /// The resource is neither `*` nor a run of letters.
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    /// An invalid permission character was encountered.
    #[error("Invalid permission character: {0}")]
    InvalidPermission(char),

    /// Permissions are not in the required order (c < r < u < d < s).
    #[error("Permissions must be in order: c < r < u < d < s")]
    InvalidPermissionOrder,

    /// The operation suffix after `.` is empty.
    #[error("Empty operation")]
    EmptyOperation,
}

// ============================================================================
// Resource Selector
// ============================================================================

/// The resource type targeted by a scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceSelector {
    /// A specific resource type name, as written in the scope.
    Named(String),

    /// Wildcard (*) matching all resource types.
    Wildcard,
}

impl ResourceSelector {
    /// Returns true for the `*` selector.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard)
    }

    fn parse(segment: &str) -> Result<Self, ScopeError> {
        if segment == "*" {
            return Ok(Self::Wildcard);
        }
        if segment.is_empty() || !segment.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ScopeError::InvalidResource(segment.to_string()));
        }
        Ok(Self::Named(segment.to_string()))
    }
}

impl fmt::Display for ResourceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(s) => write!(f, "{}", s),
            Self::Wildcard => write!(f, "*"),
        }
    }
}

// ============================================================================
// Permissions
// ============================================================================

/// FHIR operation permissions (CRUDS).
///
/// The canonical order is: create (c) < read (r) < update (u) < delete (d) < search (s).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Permissions {
    /// Create permission ('c').
    pub create: bool,
    /// Read permission ('r').
    pub read: bool,
    /// Update permission ('u').
    pub update: bool,
    /// Delete permission ('d').
    pub delete: bool,
    /// Search permission ('s').
    pub search: bool,
}

impl Permissions {
    /// All five permissions.
    #[must_use]
    pub fn all() -> Self {
        Self {
            create: true,
            read: true,
            update: true,
            delete: true,
            search: true,
        }
    }

    /// The SMART v1 `read` grant: read plus search.
    #[must_use]
    pub fn read_only() -> Self {
        Self {
            read: true,
            search: true,
            ..Self::default()
        }
    }

    /// The SMART v1 `write` grant: create, update and delete.
    #[must_use]
    pub fn write_only() -> Self {
        Self {
            create: true,
            update: true,
            delete: true,
            ..Self::default()
        }
    }

    /// Returns true if all permissions are granted.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.create && self.read && self.update && self.delete && self.search
    }

    /// Returns true if no permission is granted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !(self.create || self.read || self.update || self.delete || self.search)
    }

    /// Check if a specific permission character is granted.
    #[must_use]
    pub fn has(&self, perm: char) -> bool {
        match perm {
            'c' => self.create,
            'r' => self.read,
            'u' => self.update,
            'd' => self.delete,
            's' => self.search,
            _ => false,
        }
    }

    /// Resolve an operation suffix, trying the v1 literals first.
    fn from_operation(operation: &str) -> Result<Self, ScopeError> {
        match operation {
            "read" => Ok(Self::read_only()),
            "write" => Ok(Self::write_only()),
            "*" => Ok(Self::all()),
            "" => Err(ScopeError::EmptyOperation),
            letters => letters.parse(),
        }
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (granted, letter) in [
            (self.create, 'c'),
            (self.read, 'r'),
            (self.update, 'u'),
            (self.delete, 'd'),
            (self.search, 's'),
        ] {
            if granted {
                write!(f, "{}", letter)?;
            }
        }
        Ok(())
    }
}

impl FromStr for Permissions {
    type Err = ScopeError;

    /// Parse permissions from a CRUDS letter run.
    ///
    /// Characters must be lowercase and in order: c < r < u < d < s, each at
    /// most once. The empty string yields no permissions.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::str::FromStr;
    /// use octofhir_auth::smart::scopes::Permissions;
    ///
    /// let perms = Permissions::from_str("crus").unwrap();
    /// assert!(perms.create);
    /// assert!(perms.read);
    /// assert!(perms.update);
    /// assert!(!perms.delete);
    /// assert!(perms.search);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `ScopeError::InvalidPermission` for unknown characters.
    /// Returns `ScopeError::InvalidPermissionOrder` if characters are out of order.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut perms = Self::default();
        let mut last_order: Option<u8> = None;

        fn perm_order(c: char) -> Option<u8> {
            match c {
                'c' => Some(1),
                'r' => Some(2),
                'u' => Some(3),
                'd' => Some(4),
                's' => Some(5),
                _ => None,
            }
        }

        for c in s.chars() {
            let order = perm_order(c).ok_or(ScopeError::InvalidPermission(c))?;

            // Strictly increasing order also rules out repeats
            if let Some(prev_order) = last_order
                && order <= prev_order
            {
                return Err(ScopeError::InvalidPermissionOrder);
            }

            match c {
                'c' => perms.create = true,
                'r' => perms.read = true,
                'u' => perms.update = true,
                'd' => perms.delete = true,
                _ => perms.search = true,
            }
            last_order = Some(order);
        }

        Ok(perms)
    }
}

// ============================================================================
// Clinical Scope
// ============================================================================

/// A parsed clinical scope.
///
/// Immutable once built; read it through the accessor methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClinicalScope {
    compartment: String,
    resource: ResourceSelector,
    permissions: Permissions,
}

impl ClinicalScope {
    /// Build a scope from already-validated parts.
    #[must_use]
    pub fn new(
        compartment: impl Into<String>,
        resource: ResourceSelector,
        permissions: Permissions,
    ) -> Self {
        Self {
            compartment: compartment.into(),
            resource,
            permissions,
        }
    }

    /// Parse a clinical scope token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidClinicalScope` carrying the token when any
    /// segment fails the grammar.
    pub fn parse(scope: &str) -> Result<Self, AuthError> {
        Self::tokenize(scope).map_err(|reason| AuthError::invalid_clinical_scope(scope, reason))
    }

    /// Parse a token, returning `None` instead of an error for anything that
    /// is not a clinical scope (`openid`, `launch/patient`, typos, ...).
    #[must_use]
    pub fn parse_if_valid(scope: &str) -> Option<Self> {
        match Self::parse(scope) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::debug!(scope = %scope, error = %e, "Ignoring unknown scope");
                None
            }
        }
    }

    fn tokenize(scope: &str) -> Result<Self, ScopeError> {
        let (compartment, rest) = scope.split_once('/').ok_or(ScopeError::InvalidFormat)?;
        let (resource, operation) = rest.split_once('.').ok_or(ScopeError::InvalidFormat)?;

        if rest.contains('/') || operation.contains('.') {
            return Err(ScopeError::InvalidFormat);
        }

        if !compartment.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ScopeError::InvalidCompartment(compartment.to_string()));
        }

        let resource = ResourceSelector::parse(resource)?;

        if operation != "*" && !operation.chars().all(|c| c.is_ascii_alphabetic()) {
            // Report the first offending character, as the letter-run check would
            let bad = operation
                .chars()
                .find(|c| !c.is_ascii_alphabetic())
                .unwrap_or('.');
            return Err(ScopeError::InvalidPermission(bad));
        }

        let permissions = Permissions::from_operation(operation)?;

        Ok(Self {
            compartment: compartment.to_string(),
            resource,
            permissions,
        })
    }

    /// The compartment name, e.g. `patient`.
    #[must_use]
    pub fn compartment(&self) -> &str {
        &self.compartment
    }

    /// The targeted resource type or wildcard.
    #[must_use]
    pub fn resource(&self) -> &ResourceSelector {
        &self.resource
    }

    /// The granted CRUDS permissions.
    #[must_use]
    pub fn permissions(&self) -> Permissions {
        self.permissions
    }

    #[must_use]
    pub fn can_create(&self) -> bool {
        self.permissions.create
    }

    #[must_use]
    pub fn can_read(&self) -> bool {
        self.permissions.read
    }

    #[must_use]
    pub fn can_update(&self) -> bool {
        self.permissions.update
    }

    #[must_use]
    pub fn can_delete(&self) -> bool {
        self.permissions.delete
    }

    #[must_use]
    pub fn can_search(&self) -> bool {
        self.permissions.search
    }

    /// Returns true if all five CRUDS permissions are granted.
    #[must_use]
    pub fn is_full_cruds(&self) -> bool {
        self.permissions.is_full()
    }
}

impl FromStr for ClinicalScope {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ClinicalScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}.{}", self.compartment, self.resource, self.permissions)
    }
}

// ============================================================================
// Clinical Scopes Collection
// ============================================================================

/// The clinical scopes found in a token's grant, in grant order.
///
/// Tokens that are not clinical scopes are silently dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClinicalScopes {
    scopes: Vec<ClinicalScope>,
}

impl ClinicalScopes {
    /// Parse a space-separated scope string.
    #[must_use]
    pub fn parse(scope_string: &str) -> Self {
        Self::from_grants(scope_string.split_whitespace())
    }

    /// Parse each granted scope token, keeping the valid clinical ones.
    #[must_use]
    pub fn from_grants<I, S>(grants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let scopes = grants
            .into_iter()
            .filter_map(|s| ClinicalScope::parse_if_valid(s.as_ref()))
            .collect();
        Self { scopes }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ClinicalScope> {
        self.scopes.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

impl From<Vec<ClinicalScope>> for ClinicalScopes {
    fn from(scopes: Vec<ClinicalScope>) -> Self {
        Self { scopes }
    }
}

impl<'a> IntoIterator for &'a ClinicalScopes {
    type Item = &'a ClinicalScope;
    type IntoIter = std::slice::Iter<'a, ClinicalScope>;

    fn into_iter(self) -> Self::IntoIter {
        self.scopes.iter()
    }
}

impl fmt::Display for ClinicalScopes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.scopes.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join(" "))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn perms(scope: &str) -> Permissions {
        ClinicalScope::parse(scope).unwrap().permissions()
    }

    fn reason(scope: &str) -> ScopeError {
        match ClinicalScope::parse(scope).unwrap_err() {
            AuthError::InvalidClinicalScope { scope: s, reason } => {
                assert_eq!(s, scope);
                reason
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    // -------------------------------------------------------------------------
    // Operation Suffix Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_read_literal_sets_read_and_search() {
        for scope in ["patient/Observation.read", "user/*.read", "/Patient.read"] {
            assert_eq!(perms(scope), Permissions::read_only(), "{scope}");
        }
    }

    #[test]
    fn test_write_literal_sets_create_update_delete() {
        let p = perms("patient/Observation.write");
        assert!(p.create && p.update && p.delete);
        assert!(!p.read && !p.search);
    }

    #[test]
    fn test_star_sets_everything() {
        let scope = ClinicalScope::parse("patient/Patient.*").unwrap();
        assert!(scope.is_full_cruds());
        assert_eq!(scope.permissions(), Permissions::all());
    }

    #[test]
    fn test_cruds_letter_run_is_full() {
        assert!(ClinicalScope::parse("patient/*.cruds").unwrap().is_full_cruds());
    }

    #[test]
    fn test_each_letter_sets_only_its_bit() {
        for letter in ['c', 'r', 'u', 'd', 's'] {
            let p = perms(&format!("patient/Observation.{letter}"));
            for other in ['c', 'r', 'u', 'd', 's'] {
                assert_eq!(p.has(other), other == letter, "{letter} vs {other}");
            }
        }
    }

    #[test]
    fn test_ru_sets_read_and_update_only() {
        let p = perms("patient/Observation.ru");
        assert_eq!(
            p,
            Permissions {
                read: true,
                update: true,
                ..Permissions::default()
            }
        );
    }

    #[test]
    fn test_v1_literals_win_over_letter_run() {
        // "read" would be rejected as letters; the literal branch catches it first
        assert_eq!(perms("patient/Patient.read"), Permissions::read_only());
    }

    #[test]
    fn test_invalid_permission_char() {
        assert_eq!(reason("patient/Patient.xr"), ScopeError::InvalidPermission('x'));
        assert_eq!(reason("patient/Patient.ruxd"), ScopeError::InvalidPermission('x'));
    }

    #[test]
    fn test_permission_order_enforced() {
        assert_eq!(reason("patient/Patient.rc"), ScopeError::InvalidPermissionOrder);
        assert_eq!(reason("patient/Patient.sr"), ScopeError::InvalidPermissionOrder);
        assert_eq!(reason("patient/Patient.rr"), ScopeError::InvalidPermissionOrder);
    }

    #[test]
    fn test_letter_run_is_case_sensitive() {
        assert_eq!(reason("patient/Patient.R"), ScopeError::InvalidPermission('R'));
        assert_eq!(reason("patient/Patient.READ"), ScopeError::InvalidPermission('R'));
        assert!(ClinicalScope::parse("patient/Patient.Read").is_err());
    }

    #[test]
    fn test_empty_operation_rejected() {
        assert_eq!(reason("patient/Patient."), ScopeError::EmptyOperation);
    }

    // -------------------------------------------------------------------------
    // Token Shape Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_parts_are_extracted() {
        let scope = ClinicalScope::parse("user/Encounter.cr").unwrap();
        assert_eq!(scope.compartment(), "user");
        assert_eq!(
            scope.resource(),
            &ResourceSelector::Named("Encounter".to_string())
        );

        let scope = ClinicalScope::parse("patient/*.r").unwrap();
        assert!(scope.resource().is_wildcard());
    }

    #[test]
    fn test_empty_compartment_is_valid() {
        let scope = ClinicalScope::parse("/Patient.read").unwrap();
        assert_eq!(scope.compartment(), "");
    }

    #[test]
    fn test_invalid_shapes() {
        assert_eq!(reason("openid"), ScopeError::InvalidFormat);
        assert_eq!(reason("launch/patient"), ScopeError::InvalidFormat);
        assert_eq!(reason("patient/Patient.r.s"), ScopeError::InvalidFormat);
        assert_eq!(reason("patient/a/Patient.r"), ScopeError::InvalidFormat);
        assert_eq!(reason(""), ScopeError::InvalidFormat);
    }

    #[test]
    fn test_invalid_compartment() {
        assert_eq!(
            reason("pat1ent/Patient.r"),
            ScopeError::InvalidCompartment("pat1ent".to_string())
        );
    }

    #[test]
    fn test_invalid_resource() {
        assert_eq!(
            reason("patient/.read"),
            ScopeError::InvalidResource(String::new())
        );
        assert_eq!(
            reason("patient/Obs_1.read"),
            ScopeError::InvalidResource("Obs_1".to_string())
        );
        assert_eq!(
            reason("patient/**.read"),
            ScopeError::InvalidResource("**".to_string())
        );
    }

    #[test]
    fn test_smart_v2_query_suffix_rejected() {
        assert!(ClinicalScope::parse("patient/Observation.rs?category=laboratory").is_err());
    }

    #[test]
    fn test_parse_if_valid_swallows_errors() {
        assert!(ClinicalScope::parse_if_valid("profile").is_none());
        assert!(ClinicalScope::parse_if_valid("patient/Patient.xr").is_none());
        assert!(ClinicalScope::parse_if_valid("patient/Patient.").is_none());
        assert!(ClinicalScope::parse_if_valid("patient/Patient.read").is_some());
    }

    #[test]
    fn test_from_str() {
        let scope: ClinicalScope = "system/*.*".parse().unwrap();
        assert_eq!(scope.compartment(), "system");
        assert!("system".parse::<ClinicalScope>().is_err());
    }

    #[test]
    fn test_scope_display() {
        let scope = ClinicalScope::parse("patient/Observation.read").unwrap();
        assert_eq!(scope.to_string(), "patient/Observation.rs");
        let scope = ClinicalScope::parse("user/*.write").unwrap();
        assert_eq!(scope.to_string(), "user/*.cud");
    }

    // -------------------------------------------------------------------------
    // ClinicalScopes Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_clinical_scopes_skip_unknown() {
        let scopes = ClinicalScopes::parse(
            "openid fhirUser launch/patient patient/Observation.rs offline_access user/*.read",
        );
        assert_eq!(scopes.len(), 2);
        let rendered: Vec<String> = scopes.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["patient/Observation.rs", "user/*.rs"]);
    }

    #[test]
    fn test_clinical_scopes_from_grants_keeps_order() {
        let grants = vec!["patient/Patient.r".to_string(), "patient/*.read".to_string()];
        let scopes = ClinicalScopes::from_grants(&grants);
        assert_eq!(scopes.to_string(), "patient/Patient.r patient/*.rs");
    }

    #[test]
    fn test_clinical_scopes_empty() {
        assert!(ClinicalScopes::parse("").is_empty());
        assert!(ClinicalScopes::parse("openid profile").is_empty());
    }
}
