// ABOUTME: Merge engine building key-to-hosts and host-to-keys indexes from parsed entries
// ABOUTME: Also computes the optional transitive closure across keys that share a host

use crate::ssh::parser::{Entry, KeyId};
use std::collections::{BTreeSet, HashMap};

/// Bidirectional index between keys and the hosts they were seen with.
///
/// Both maps are kept consistent: `h` is in `key_to_hosts[k]` exactly when
/// `k` is in `host_to_keys[h]`.
#[derive(Debug, Default, Clone)]
pub struct MergeIndex {
    key_to_hosts: HashMap<KeyId, BTreeSet<String>>,
    host_to_keys: HashMap<String, BTreeSet<KeyId>>,
}

impl MergeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> Self {
        let mut index = Self::new();
        for entry in entries {
            index.insert(entry);
        }
        index
    }

    fn insert(&mut self, entry: &Entry) {
        for host in &entry.hosts {
            self.link(&entry.key, host);
        }
    }

    fn link(&mut self, key: &KeyId, host: &str) {
        self.key_to_hosts
            .entry(key.clone())
            .or_default()
            .insert(host.to_string());
        self.host_to_keys
            .entry(host.to_string())
            .or_default()
            .insert(key.clone());
    }

    pub fn key_count(&self) -> usize {
        self.key_to_hosts.len()
    }

    #[cfg(test)]
    pub fn hosts_for(&self, key: &KeyId) -> Option<&BTreeSet<String>> {
        self.key_to_hosts.get(key)
    }

    #[cfg(test)]
    pub fn keys_for(&self, host: &str) -> Option<&BTreeSet<KeyId>> {
        self.host_to_keys.get(host)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&KeyId, &BTreeSet<String>)> {
        self.key_to_hosts.iter()
    }

    /// Grows every key's host set to the hosts of all keys reachable through
    /// shared hosts, repeating full passes until nothing changes. Returns the
    /// number of passes made.
    pub fn close(&mut self) -> usize {
        // Deterministic pass order keeps the debug output stable.
        let mut keys: Vec<KeyId> = self.key_to_hosts.keys().cloned().collect();
        keys.sort();

        let mut passes = 0;
        let mut changed = true;
        while changed {
            changed = false;
            passes += 1;

            for key in &keys {
                let hosts = &self.key_to_hosts[key];
                let reachable: BTreeSet<String> = hosts
                    .iter()
                    .filter_map(|host| self.host_to_keys.get(host))
                    .flatten()
                    .filter_map(|other| self.key_to_hosts.get(other))
                    .flatten()
                    .filter(|host| !hosts.contains(*host))
                    .cloned()
                    .collect();

                if reachable.is_empty() {
                    continue;
                }
                changed = true;
                for host in &reachable {
                    self.link(key, host);
                }
            }
            tracing::debug!("Transitive closure pass {passes} changed={changed}");
        }

        passes
    }
}
