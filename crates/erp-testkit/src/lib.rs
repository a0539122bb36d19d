// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use erp_app::{
    Employee, EmployeeId, EmployeeStatus, EmployeeType, EmployeeTypeId, ItemId, MethodType, Part,
    PartRevision, ReplenishmentSystem, TrackingType, UserId,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

const EMPLOYEE_TYPES: [&str; 5] = ["Admin", "Engineering", "Operations", "Purchasing", "Sales"];

const TAGS: [&str; 8] = [
    "aluminum",
    "fastener",
    "machined",
    "molded",
    "outsourced",
    "rohs",
    "sheet-metal",
    "spare",
];

const PART_NOUNS: [&str; 16] = [
    "Bracket", "Housing", "Shaft", "Bushing", "Gasket", "Spacer", "Flange", "Hinge", "Panel",
    "Clamp", "Bearing", "Coupler", "Lever", "Manifold", "Nozzle", "Plate",
];
const PART_ADJECTIVES: [&str; 10] = [
    "Mounting", "Upper", "Lower", "Side", "Rear", "Front", "Hex", "Threaded", "Sealed", "Heavy",
];
const PART_PREFIXES: [&str; 6] = ["BRK", "HSG", "SFT", "MEC", "ELC", "FAB"];

const FIRST_NAMES: [&str; 16] = [
    "Avery", "Jordan", "Taylor", "Riley", "Morgan", "Casey", "Alex", "Quinn", "Parker", "Drew",
    "Kai", "Elliot", "Robin", "Cameron", "Hayden", "Rowan",
];
const LAST_NAMES: [&str; 18] = [
    "Walker", "Martin", "Hill", "Evans", "Lopez", "Gray", "Ward", "Young", "Diaz", "Reed",
    "Campbell", "Turner", "Flores", "Bennett", "Price", "Morris", "Foster", "Brooks",
];

const WORDS: [&str; 20] = [
    "anodized",
    "finish",
    "tolerance",
    "assembly",
    "torque",
    "inspect",
    "revision",
    "supplier",
    "drawing",
    "coating",
    "stock",
    "lead",
    "time",
    "batch",
    "serialized",
    "weld",
    "fixture",
    "gauge",
    "deburr",
    "pack",
];

const REFERENCE_NOW: OffsetDateTime = datetime!(2026-01-01 00:00 UTC);

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn chance(&mut self, percent: u64) -> bool {
        self.next_u64() % 100 < percent
    }
}

/// Seeded source of plausible parts and employees. Equal seeds yield equal rows.
#[derive(Debug, Clone)]
pub struct ErpFaker {
    rng: DeterministicRng,
    next_part: u32,
    next_employee: u32,
}

impl ErpFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            next_part: 0,
            next_employee: 0,
        }
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    pub fn part(&mut self, created_by: &UserId) -> Part {
        self.next_part += 1;
        let id = ItemId::new(format!("item-{:04}", self.next_part));
        let readable = format!(
            "{}-{}",
            self.pick(&PART_PREFIXES),
            1000 + self.next_part * 7 + self.rng.int_n(7) as u32
        );
        let tags = TAGS
            .iter()
            .filter(|_| self.rng.chance(20))
            .map(|tag| (*tag).to_owned())
            .collect();
        let created_at = self.datetime_before_reference(365);

        Part {
            revisions: vec![PartRevision {
                id: id.clone(),
                revision: 1,
            }],
            id,
            readable_id_with_revision: format!("{readable}.1"),
            name: format!("{} {}", self.pick(&PART_ADJECTIVES), self.pick(&PART_NOUNS)),
            description: self.sentence(4, 10),
            thumbnail_path: None,
            item_tracking_type: TrackingType::ALL[self.rng.int_n(TrackingType::ALL.len())],
            default_method_type: MethodType::ALL[self.rng.int_n(MethodType::ALL.len())],
            replenishment_system: ReplenishmentSystem::ALL
                [self.rng.int_n(ReplenishmentSystem::ALL.len())],
            tags,
            active: self.rng.chance(85),
            created_by: created_by.clone(),
            created_at,
            updated_by: None,
            updated_at: None,
            custom_fields: BTreeMap::new(),
        }
    }

    pub fn employee(&mut self) -> Employee {
        self.next_employee += 1;
        let first_name = self.pick(&FIRST_NAMES).to_owned();
        let last_name = self.pick(&LAST_NAMES).to_owned();
        let email = format!(
            "{}.{}{}@example.com",
            first_name.to_lowercase(),
            last_name.to_lowercase(),
            self.next_employee
        );
        let kind = self.pick(&EMPLOYEE_TYPES);
        let active = self.rng.chance(75);
        let status = if active {
            EmployeeStatus::ALL[self.rng.int_n(EmployeeStatus::ALL.len())]
        } else {
            EmployeeStatus::Unavailable
        };

        Employee {
            id: EmployeeId::new(format!("emp-{:04}", self.next_employee)),
            first_name,
            last_name,
            email,
            employee_type_id: Some(employee_type_id(kind)),
            active,
            employee_status_id: Some(status.code().to_owned()),
        }
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn datetime_before_reference(&mut self, max_days: i64) -> OffsetDateTime {
        let span = u64::try_from(max_days * 24 * 60 * 60).unwrap_or(1).max(1);
        let offset = (self.rng.next_u64() % span) as i64;
        REFERENCE_NOW - Duration::seconds(offset)
    }

    fn sentence(&mut self, min_words: usize, max_words: usize) -> String {
        let spread = max_words.saturating_sub(min_words) + 1;
        let count = min_words + self.rng.int_n(spread);
        let mut sentence = (0..count)
            .map(|_| self.pick(&WORDS))
            .collect::<Vec<_>>()
            .join(" ");
        if let Some(first) = sentence.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        sentence.push('.');
        sentence
    }
}

pub fn employee_type_id(name: &str) -> EmployeeTypeId {
    EmployeeTypeId::new(format!("type-{}", name.to_lowercase()))
}

pub fn employee_types() -> Vec<EmployeeType> {
    EMPLOYEE_TYPES
        .iter()
        .map(|name| EmployeeType {
            id: employee_type_id(name),
            name: (*name).to_owned(),
        })
        .collect()
}

pub fn tags() -> &'static [&'static str] {
    &TAGS
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("erp.db");
    Ok((dir, db_path))
}

pub fn fixture_datetime() -> &'static str {
    "2026-02-19T12:34:56Z"
}

#[cfg(test)]
mod tests {
    use super::{ErpFaker, employee_types, tags};
    use erp_app::{EmployeeStatus, UserId};
    use std::collections::BTreeSet;

    #[test]
    fn same_seed_same_rows() {
        let creator = UserId::new("emp-0001");
        let mut left = ErpFaker::new(42);
        let mut right = ErpFaker::new(42);
        assert_eq!(left.part(&creator), right.part(&creator));
        assert_eq!(left.employee(), right.employee());
    }

    #[test]
    fn part_ids_are_unique_and_self_revised() {
        let creator = UserId::new("emp-0001");
        let mut faker = ErpFaker::new(7);
        let parts: Vec<_> = (0..20).map(|_| faker.part(&creator)).collect();
        let ids: BTreeSet<_> = parts.iter().map(|part| part.id.clone()).collect();
        assert_eq!(ids.len(), parts.len());
        for part in &parts {
            assert_eq!(part.revisions.len(), 1);
            assert_eq!(part.revisions[0].id, part.id);
            assert!(part.readable_id_with_revision.ends_with(".1"));
            assert!(part.description.ends_with('.'));
            assert!(part.tags.iter().all(|tag| tags().contains(&tag.as_str())));
        }
    }

    #[test]
    fn inactive_employees_are_unavailable() {
        let mut faker = ErpFaker::new(3);
        let known: BTreeSet<_> = employee_types().into_iter().map(|kind| kind.id).collect();
        for employee in (0..40).map(|_| faker.employee()) {
            if !employee.active {
                assert_eq!(employee.status(), EmployeeStatus::Unavailable);
            }
            assert!(employee.email.ends_with("@example.com"));
            assert!(
                employee
                    .employee_type_id
                    .as_ref()
                    .is_some_and(|id| known.contains(id))
            );
        }
    }

    #[test]
    fn variety_across_seeds() {
        let creator = UserId::new("emp-0001");
        let names: BTreeSet<_> = (1..10)
            .map(|seed| ErpFaker::new(seed).part(&creator).name)
            .collect();
        assert!(names.len() > 1);
    }
}
