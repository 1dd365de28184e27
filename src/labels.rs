/*!
The [`Labels`] type.

Labels are an ordered sequence of strings attached to a stream or an
event. Each entry is a bare key `k`, a key-value `k=v`, or a tombstone
`=k` recording that the key was deleted. Keeping tombstones in place (and
replacing them in place on re-set) preserves the insertion position of
every key across delete/set cycles, which keeps merged label streams
stable for downstream consumers.
*/

use core::fmt;

/**
An ordered set of labels.
*/
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Labels(Vec<String>);

impl Labels {
    pub const fn new() -> Labels {
        Labels(Vec::new())
    }

    /**
    Labels from `key=value` pairs.
    */
    pub fn from_pairs<K: AsRef<str>, V: AsRef<str>>(
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Labels {
        let mut ls = Labels::new();
        for (k, v) in pairs {
            ls.set(k.as_ref(), v.as_ref());
        }
        ls
    }

    /**
    Set `k` to `v`, replacing any existing entry (or tombstone) for `k`
    in place. An empty `v` stores the bare key.
    */
    pub fn set(&mut self, k: &str, v: &str) {
        let val = if v.is_empty() {
            k.to_owned()
        } else {
            format!("{}={}", k, v)
        };

        for entry in self.0.iter_mut() {
            if is_entry_for(entry, k) {
                *entry = val;
                return;
            }
        }

        self.0.push(val);
    }

    /**
    Get the value stored for `k`. A tombstoned key is not found. Bare
    keys are found with an empty value.
    */
    pub fn get(&self, k: &str) -> Option<&str> {
        for entry in &self.0 {
            if entry == k {
                return Some("");
            }
            if let Some(rest) = entry.strip_prefix(k) {
                if let Some(v) = rest.strip_prefix('=') {
                    return Some(v);
                }
            }
        }

        None
    }

    /**
    Delete `k`, leaving a tombstone in its position.
    */
    pub fn del(&mut self, k: &str) {
        for entry in self.0.iter_mut() {
            if entry.strip_prefix('=') == Some(k) {
                return;
            }
            if is_live_entry_for(entry, k) {
                *entry = format!("={}", k);
            }
        }
    }

    /**
    Apply the entries of `other` in order: entries beginning with `=`
    delete, everything else sets.
    */
    pub fn merge(&mut self, other: &Labels) {
        for entry in &other.0 {
            if entry.is_empty() {
                continue;
            }

            match entry.split_once('=') {
                Some(("", k)) => self.del(k),
                Some((k, v)) => self.set(k, v),
                None => self.set(entry, ""),
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|entry| entry.as_str())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /**
    Labels with well-known keys filled in.

    `_pid` becomes the current process id and `_hostname` the value of
    the `HOSTNAME` environment variable when present. Every other entry
    is kept verbatim.
    */
    pub fn with_defaults<S: AsRef<str>>(entries: impl IntoIterator<Item = S>) -> Labels {
        let mut ls = Labels::new();

        for entry in entries {
            match entry.as_ref() {
                "_pid" => ls.set("_pid", &std::process::id().to_string()),
                "_hostname" => {
                    if let Ok(host) = std::env::var("HOSTNAME") {
                        ls.set("_hostname", &host);
                    } else {
                        ls.set("_hostname", "");
                    }
                }
                other => ls.0.push(other.to_owned()),
            }
        }

        ls
    }
}

// A tombstone counts: set replaces it in place.
fn is_entry_for(entry: &str, k: &str) -> bool {
    entry.strip_prefix('=') == Some(k) || is_live_entry_for(entry, k)
}

fn is_live_entry_for(entry: &str, k: &str) -> bool {
    entry == k
        || entry
            .strip_prefix(k)
            .is_some_and(|rest| rest.starts_with('='))
}

impl<S: Into<String>> FromIterator<S> for Labels {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Labels {
        Labels(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Debug for Labels {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get() {
        let mut ls = Labels::new();

        ls.set("a", "1");

        assert_eq!(ls.get("a"), Some("1"));
        assert_eq!(ls.get("b"), None);
    }

    #[test]
    fn bare_key_is_found_empty() {
        let mut ls = Labels::new();

        ls.set("flag", "");

        assert_eq!(ls.get("flag"), Some(""));
        assert_eq!(ls.as_slice(), ["flag"]);
    }

    #[test]
    fn del_leaves_tombstone() {
        let mut ls = Labels::new();

        ls.set("a", "1");
        ls.set("b", "2");
        ls.del("a");

        assert_eq!(ls.get("a"), None);
        assert_eq!(ls.as_slice(), ["=a", "b=2"]);
    }

    #[test]
    fn del_is_idempotent() {
        let mut ls = Labels::new();

        ls.set("a", "1");
        ls.del("a");
        ls.del("a");

        assert_eq!(ls.as_slice(), ["=a"]);
    }

    #[test]
    fn set_after_del_restores_position() {
        let mut ls = Labels::new();

        ls.set("a", "1");
        ls.set("b", "2");
        ls.del("a");
        ls.set("a", "3");

        assert_eq!(ls.as_slice(), ["a=3", "b=2"]);
    }

    #[test]
    fn key_prefixes_do_not_collide() {
        let mut ls = Labels::new();

        ls.set("ab", "1");
        ls.set("a", "2");

        assert_eq!(ls.get("a"), Some("2"));
        assert_eq!(ls.get("ab"), Some("1"));
        assert_eq!(ls.len(), 2);
    }

    #[test]
    fn merge_applies_in_order() {
        let mut ls = Labels::new();
        ls.set("a", "1");
        ls.set("b", "2");

        let patch: Labels = ["=a", "c=3", "b=4", "d"].into_iter().collect();
        ls.merge(&patch);

        assert_eq!(ls.get("a"), None);
        assert_eq!(ls.get("b"), Some("4"));
        assert_eq!(ls.get("c"), Some("3"));
        assert_eq!(ls.get("d"), Some(""));
        assert_eq!(ls.as_slice(), ["=a", "b=4", "c=3", "d"]);
    }

    #[test]
    fn with_defaults_fills_pid() {
        let ls = Labels::with_defaults(["_pid", "env=prod"]);

        assert_eq!(ls.get("_pid"), Some(std::process::id().to_string().as_str()));
        assert_eq!(ls.get("env"), Some("prod"));
    }
}
