// ABOUTME: Deterministic ordering and rendering of merged known_hosts records
// ABOUTME: Hostnames sort before IP literals, records group by host list then preferred key type

use crate::ssh::merge::MergeIndex;
use crate::ssh::parser::KeyId;
use std::cmp::Ordering;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub hosts: Vec<String>,
    pub key: KeyId,
}

impl Record {
    pub fn new(hosts: impl IntoIterator<Item = String>, key: KeyId) -> Self {
        let mut hosts: Vec<String> = hosts.into_iter().collect();
        hosts.sort_by(|a, b| compare_hosts(a, b));
        hosts.dedup();
        Self { hosts, key }
    }

    pub fn host_list(&self) -> String {
        self.hosts.join(",")
    }

    pub fn render(&self) -> String {
        format!(
            "{} {} {}\n",
            self.host_list(),
            self.key.key_type,
            self.key.material
        )
    }
}

/// Tier 1 hosts (IPv4 and bracketed literals) are listed after plain names.
pub fn host_tier(host: &str) -> u8 {
    if is_ipv4_literal(host) || (host.starts_with('[') && host.ends_with(']')) {
        1
    } else {
        0
    }
}

fn is_ipv4_literal(host: &str) -> bool {
    let octets: Vec<&str> = host.split('.').collect();
    octets.len() == 4
        && octets
            .iter()
            .all(|o| (1..=3).contains(&o.len()) && o.bytes().all(|b| b.is_ascii_digit()))
}

pub fn compare_hosts(a: &str, b: &str) -> Ordering {
    (host_tier(a), a).cmp(&(host_tier(b), b))
}

pub fn key_type_priority(key_type: &str) -> u8 {
    match key_type {
        "ssh-ed25519" => 0,
        "ssh-rsa" => 1,
        "ecdsa-sha2-nistp256" => 2,
        _ => 99,
    }
}

pub fn sorted_records(index: &MergeIndex) -> Vec<Record> {
    let mut records: Vec<(String, Record)> = index
        .iter()
        .map(|(key, hosts)| {
            let record = Record::new(hosts.iter().cloned(), key.clone());
            (record.host_list(), record)
        })
        .collect();

    records.sort_by(|(a_hosts, a), (b_hosts, b)| {
        a_hosts
            .cmp(b_hosts)
            .then_with(|| key_type_priority(&a.key.key_type).cmp(&key_type_priority(&b.key.key_type)))
            .then_with(|| a.key.key_type.cmp(&b.key.key_type))
            .then_with(|| a.key.material.cmp(&b.key.material))
    });

    records.into_iter().map(|(_, record)| record).collect()
}
