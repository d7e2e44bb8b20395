//! Session / observation domain state (C4): per-domain template
//! tables, template definition/withdrawal, and sequence-number
//! tracking.
//!
//! A session is identified by an opaque caller-supplied handle (§9,
//! "Session management ambiguity") — this module never demultiplexes
//! by transport address or connection identity itself. The session
//! owns one [`DomainState`] per observation domain it has seen,
//! created lazily on first reference.

use std::collections::HashMap;

use crate::error::CoreError;
use crate::template::WireTemplate;

/// Outcome of [`DomainState::define`], distinguishing a no-op
/// redefinition from one that actually replaces the template (and so
/// invalidates any plan cached against the old one, per §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefineOutcome {
    New,
    UnchangedNoop,
    Redefined,
}

/// Per-(session, observation domain) template table and sequence
/// tracking (§3, "Session / Observation Domain").
#[derive(Default)]
pub struct DomainState {
    templates: HashMap<u16, WireTemplate>,
    expected_seq: Option<u32>,
}

impl DomainState {
    pub fn new() -> Self {
        DomainState::default()
    }

    /// Define or redefine a template ID. Per §4.4: an identical
    /// redefinition is a no-op; a differing one withdraws the old
    /// template and installs the new one.
    pub fn define(&mut self, template: WireTemplate) -> DefineOutcome {
        let tid = template.id();
        match self.templates.get(&tid) {
            Some(existing) if existing.same_fields_as(&template) => DefineOutcome::UnchangedNoop,
            Some(_) => {
                self.templates.insert(tid, template);
                DefineOutcome::Redefined
            }
            None => {
                self.templates.insert(tid, template);
                DefineOutcome::New
            }
        }
    }

    /// Withdraw a template ID. Returns `true` if it was defined.
    pub fn withdraw(&mut self, tid: u16) -> bool {
        self.templates.remove(&tid).is_some()
    }

    pub fn lookup(&self, tid: u16) -> Option<&WireTemplate> {
        self.templates.get(&tid)
    }

    /// Track the sequence number carried by a newly-received message
    /// header for this domain. Returns `Ok(())` on the expected value
    /// (or the first message seen), `Err(SequenceGap)` otherwise — the
    /// tracker resynchronizes to `got` regardless, per §7 ("reported
    /// but not fatal").
    pub fn observe_sequence(&mut self, got: u32) -> Result<(), CoreError> {
        let result = match self.expected_seq {
            None => Ok(()),
            Some(expected) if expected == got => Ok(()),
            Some(expected) => Err(CoreError::SequenceGap { expected, got }),
        };
        self.expected_seq = Some(got.wrapping_add(1));
        result
    }
}

/// A session's full template state: one [`DomainState`] per
/// observation domain, created lazily on first reference (§4.4).
#[derive(Default)]
pub struct Session {
    domains: HashMap<u32, DomainState>,
}

impl Session {
    pub fn new() -> Self {
        Session::default()
    }

    pub fn domain(&mut self, domain_id: u32) -> &mut DomainState {
        self.domains.entry(domain_id).or_default()
    }

    pub fn domain_if_present(&self, domain_id: u32) -> Option<&DomainState> {
        self.domains.get(&domain_id)
    }

    pub fn domain_count(&self) -> usize {
        self.domains.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ie::STANDARD_CATALOG;

    fn simple_template(id: u16, field_names: &[&str]) -> WireTemplate {
        let mut t = WireTemplate::new(id);
        for name in field_names {
            let ie = STANDARD_CATALOG.lookup_by_name(name).unwrap();
            t.add(ie, ie.default_length).unwrap();
        }
        t.activate();
        t
    }

    #[test]
    fn redefinition_with_identical_fields_is_noop() {
        let mut domain = DomainState::new();
        assert_eq!(
            domain.define(simple_template(256, &["octetDeltaCount"])),
            DefineOutcome::New
        );
        assert_eq!(
            domain.define(simple_template(256, &["octetDeltaCount"])),
            DefineOutcome::UnchangedNoop
        );
    }

    #[test]
    fn redefinition_with_differing_fields_replaces_template() {
        let mut domain = DomainState::new();
        domain.define(simple_template(256, &["octetDeltaCount"]));
        let outcome = domain.define(simple_template(256, &["octetDeltaCount", "packetDeltaCount"]));
        assert_eq!(outcome, DefineOutcome::Redefined);
        assert_eq!(domain.lookup(256).unwrap().fields().len(), 2);
    }

    #[test]
    fn withdrawal_removes_lookup() {
        let mut domain = DomainState::new();
        domain.define(simple_template(256, &["octetDeltaCount"]));
        assert!(domain.withdraw(256));
        assert!(domain.lookup(256).is_none());
        assert!(!domain.withdraw(256));
    }

    #[test]
    fn sequence_gap_is_reported_but_tracker_resyncs() {
        let mut domain = DomainState::new();
        assert!(domain.observe_sequence(10).is_ok());
        assert!(domain.observe_sequence(11).is_ok());
        assert_eq!(
            domain.observe_sequence(50),
            Err(CoreError::SequenceGap {
                expected: 12,
                got: 50
            })
        );
        // tracker resyncs to the observed value regardless
        assert!(domain.observe_sequence(51).is_ok());
    }

    #[test]
    fn domains_are_created_lazily_and_independently() {
        let mut session = Session::new();
        assert_eq!(session.domain_count(), 0);
        session.domain(7).define(simple_template(256, &["octetDeltaCount"]));
        session.domain(8).define(simple_template(256, &["packetDeltaCount"]));
        assert_eq!(session.domain_count(), 2);
        assert_ne!(
            session.domain_if_present(7).unwrap().lookup(256).unwrap().fields()[0].ie.name,
            session.domain_if_present(8).unwrap().lookup(256).unwrap().fields()[0].ie.name,
        );
    }
}
