/// Site rotation policy.
///
/// Given the registry and the current site, picks the next site to visit:
///
/// 1. If every site is exhausted, all failure counters are cleared.
/// 2. Candidates follow configured order, rotated so the site after the
///    current one comes first and the current site comes last.
/// 3. Sites with an open priority window (other than the current site) jump
///    the queue, soonest-to-expire first.
/// 4. Exhausted sites are skipped. Skipping a site serves its backoff, so it
///    is eligible again on the next pass.
///
/// Given the same registry state the result is always the same.
use heapless::Vec;

use crate::site::{Millis, SiteRegistry, MAX_SITES};

/// Outcome of a rotation decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Registry index of the chosen site
    pub index: usize,
    /// Whether the global failure reset fired for this decision
    pub global_reset: bool,
}

/// Registry indices in round-robin order, starting after `current`.
pub fn rotated_order(len: usize, current: Option<usize>) -> Vec<usize, MAX_SITES> {
    let start = current.map_or(0, |c| c + 1);
    (0..len).map(|i| (start + i) % len).collect()
}

/// Pick the next site. Returns `None` only for an empty registry.
pub fn select_next(
    registry: &mut SiteRegistry,
    current: Option<usize>,
    now: Millis,
) -> Option<Selection> {
    if registry.is_empty() {
        return None;
    }

    let global_reset = registry.all_exhausted();
    if global_reset {
        registry.reset_failures();
    }

    let order = rotated_order(registry.len(), current);

    // Priority promotion: soonest expiry first, ties by rotation position
    let promoted = order
        .iter()
        .enumerate()
        .filter(|&(_, &i)| Some(i) != current)
        .filter_map(|(pos, &i)| {
            let site = registry.at(i)?;
            if site.is_exhausted() || !site.has_priority(now) {
                return None;
            }
            Some((site.priority_expires_at()?, pos, i))
        })
        .min();
    if let Some((_, _, index)) = promoted {
        return Some(Selection {
            index,
            global_reset,
        });
    }

    for &i in &order {
        let Some(site) = registry.at_mut(i) else {
            continue;
        };
        if !site.is_exhausted() {
            return Some(Selection {
                index: i,
                global_reset,
            });
        }
        if Some(i) != current {
            log::debug!("Skipping exhausted site {} for this pass", site.site_id);
            site.consecutive_failures = 0;
        }
    }

    // Not reached: at least one site was not exhausted after the reset check
    Some(Selection {
        index: order[0],
        global_reset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::ActivityKind;
    use crate::site::tests::registry;

    fn exhaust(reg: &mut SiteRegistry, index: usize) {
        let site = reg.at_mut(index).unwrap();
        site.consecutive_failures = site.control_channels().len();
    }

    #[test]
    fn rotated_order_starts_after_current() {
        assert_eq!(rotated_order(3, None).as_slice(), &[0, 1, 2]);
        assert_eq!(rotated_order(3, Some(0)).as_slice(), &[1, 2, 0]);
        assert_eq!(rotated_order(3, Some(2)).as_slice(), &[0, 1, 2]);
        assert_eq!(rotated_order(1, Some(0)).as_slice(), &[0]);
    }

    #[test]
    fn empty_registry_has_no_selection() {
        let mut reg = SiteRegistry::new();
        assert_eq!(select_next(&mut reg, None, 0), None);
    }

    #[test]
    fn round_robin_without_priority() {
        let mut reg = registry(&["a", "b", "c"]);
        let mut current = None;
        let mut visited = heapless::Vec::<usize, 8>::new();
        for _ in 0..6 {
            let sel = select_next(&mut reg, current, 0).unwrap();
            visited.push(sel.index).unwrap();
            current = Some(sel.index);
        }
        assert_eq!(visited.as_slice(), &[0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn priority_sites_jump_the_queue_soonest_expiry_first() {
        let mut reg = registry(&["a", "b", "c", "d"]);
        reg.at_mut(3).unwrap().record_activity(ActivityKind::Voice, 100, 2_500);
        reg.at_mut(2).unwrap().record_activity(ActivityKind::Tsbk, 200, 2_500);

        // From a: d expires first (2600) even though c is earlier in order
        let sel = select_next(&mut reg, Some(0), 300).unwrap();
        assert_eq!(sel.index, 3);
        // From d: d itself is not promoted, c still is
        let sel = select_next(&mut reg, Some(3), 400).unwrap();
        assert_eq!(sel.index, 2);
    }

    #[test]
    fn expired_priority_is_not_promoted() {
        let mut reg = registry(&["a", "b", "c"]);
        reg.at_mut(2).unwrap().record_activity(ActivityKind::Tsbk, 0, 800);
        assert_eq!(select_next(&mut reg, Some(0), 799).unwrap().index, 2);
        assert_eq!(select_next(&mut reg, Some(0), 800).unwrap().index, 1);
    }

    #[test]
    fn current_site_is_not_promoted() {
        let mut reg = registry(&["a", "b"]);
        reg.at_mut(0).unwrap().record_activity(ActivityKind::Tsbk, 0, 2_500);
        assert_eq!(select_next(&mut reg, Some(0), 400).unwrap().index, 1);
    }

    #[test]
    fn exhausted_priority_site_is_not_promoted() {
        let mut reg = registry(&["a", "b", "c"]);
        reg.at_mut(2).unwrap().record_activity(ActivityKind::Tsbk, 0, 2_500);
        exhaust(&mut reg, 2);
        assert_eq!(select_next(&mut reg, Some(0), 100).unwrap().index, 1);
    }

    #[test]
    fn exhausted_site_is_skipped_for_one_pass() {
        let mut reg = registry(&["a", "b", "c"]);
        exhaust(&mut reg, 0);

        // Leaving a: b is next, a keeps its failures
        let sel = select_next(&mut reg, Some(0), 0).unwrap();
        assert_eq!(sel.index, 1);
        assert!(reg.at(0).unwrap().is_exhausted());

        assert_eq!(select_next(&mut reg, Some(1), 0).unwrap().index, 2);

        // From c, a is walked over: skipped and released for the next pass
        let sel = select_next(&mut reg, Some(2), 0).unwrap();
        assert_eq!(sel.index, 1);
        assert_eq!(reg.at(0).unwrap().consecutive_failures(), 0);

        assert_eq!(select_next(&mut reg, Some(1), 0).unwrap().index, 2);
        assert_eq!(select_next(&mut reg, Some(2), 0).unwrap().index, 0);
    }

    #[test]
    fn global_reset_when_every_site_exhausted() {
        let mut reg = registry(&["a", "b", "c"]);
        for i in 0..3 {
            exhaust(&mut reg, i);
        }
        let sel = select_next(&mut reg, Some(1), 0).unwrap();
        assert!(sel.global_reset);
        assert_eq!(sel.index, 2);
        assert!(reg.iter().all(|s| s.consecutive_failures() == 0));
    }

    #[test]
    fn only_current_left_is_reselected() {
        let mut reg = registry(&["a", "b"]);
        exhaust(&mut reg, 1);
        let sel = select_next(&mut reg, Some(0), 0).unwrap();
        assert_eq!(sel.index, 0);
        assert!(!sel.global_reset);
        assert_eq!(reg.at(1).unwrap().consecutive_failures(), 0);
    }

    #[test]
    fn single_site_registry_always_selects_it() {
        let mut reg = registry(&["default"]);
        assert_eq!(select_next(&mut reg, None, 0).unwrap().index, 0);
        assert_eq!(select_next(&mut reg, Some(0), 0).unwrap().index, 0);
        exhaust(&mut reg, 0);
        let sel = select_next(&mut reg, Some(0), 0).unwrap();
        assert!(sel.global_reset);
        assert_eq!(sel.index, 0);
    }
}
