/*!
The [`Location`] type.

A location is an integer token naming a source call site. Tokens come from
a process-global registry: registering the same metadata twice yields two
tokens, so producers cache theirs, usually through the [`callsite!`] macro
which registers once per expansion site. Resolution is pure and stable for
the process lifetime, which is what lets encoders describe each location
on the wire exactly once and refer to it by token afterwards.

The zero token means "unknown" and resolves to nothing.
*/

use once_cell::sync::Lazy;
use std::sync::{PoisonError, RwLock};

/**
An integer token identifying a source call site.
*/
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Hash)]
pub struct Location(u64);

/**
The resolved metadata of a [`Location`].
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Callsite {
    pub name: &'static str,
    pub file: &'static str,
    pub line: u32,
    /**
    The token of the enclosing function's entry. With a registry instead
    of program counters there is no separate entry address, so this
    defaults to the location's own token.
    */
    pub entry: Location,
}

// Entries are immortal: resolution must stay valid for the process
// lifetime, so dynamically-built names are leaked into it.
static REGISTRY: Lazy<RwLock<Vec<Callsite>>> = Lazy::new(|| RwLock::new(Vec::new()));

impl Location {
    /**
    The unknown location.
    */
    pub const ZERO: Location = Location(0);

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /**
    The raw token value.
    */
    pub fn token(&self) -> u64 {
        self.0
    }

    /**
    Register a call site and get its token.
    */
    pub fn register(name: &str, file: &str, line: u32) -> Location {
        Location::register_static(intern(name), intern(file), line)
    }

    /**
    Register a call site with static metadata, avoiding the intern copy.
    */
    pub fn register_static(name: &'static str, file: &'static str, line: u32) -> Location {
        let mut registry = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);

        let token = Location((registry.len() + 1) as u64);
        registry.push(Callsite {
            name,
            file,
            line,
            entry: token,
        });

        token
    }

    /**
    Resolve the token back to its call-site metadata.
    */
    pub fn resolve(&self) -> Option<Callsite> {
        if self.0 == 0 {
            return None;
        }

        REGISTRY
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(self.0 as usize - 1)
            .copied()
    }

    /**
    Resolve to `(name, file, line)`, with `("???", "???", 0)` for tokens
    that resolve to nothing.
    */
    pub fn name_file_line(&self) -> (&'static str, &'static str, u32) {
        match self.resolve() {
            Some(site) => (site.name, site.file, site.line),
            None => ("???", "???", 0),
        }
    }

    /**
    The entry token of the enclosing function.
    */
    pub fn entry(&self) -> Location {
        self.resolve().map(|site| site.entry).unwrap_or(*self)
    }
}

fn intern(s: &str) -> &'static str {
    Box::leak(s.to_owned().into_boxed_str())
}

/**
Register the current source position once and reuse its token on every
subsequent pass through this expression.

```
let loc = spanlog::callsite!();
assert!(!loc.is_zero());
```
*/
#[macro_export]
macro_rules! callsite {
    () => {{
        static SITE: ::std::sync::OnceLock<$crate::Location> = ::std::sync::OnceLock::new();
        *SITE.get_or_init(|| {
            $crate::Location::register_static(module_path!(), file!(), line!())
        })
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_resolves_to_nothing() {
        assert_eq!(Location::ZERO.resolve(), None);
        assert_eq!(Location::ZERO.name_file_line(), ("???", "???", 0));
    }

    #[test]
    fn registered_location_resolves() {
        let loc = Location::register("app::handler", "src/app.rs", 17);

        let (name, file, line) = loc.name_file_line();

        assert_eq!(name, "app::handler");
        assert_eq!(file, "src/app.rs");
        assert_eq!(line, 17);
        assert_eq!(loc.entry(), loc);
    }

    #[test]
    fn resolution_is_stable() {
        let loc = Location::register("stable", "stable.rs", 1);

        assert_eq!(loc.resolve(), loc.resolve());
    }

    #[test]
    fn callsite_registers_once() {
        fn site() -> Location {
            callsite!()
        }

        let a = site();
        let b = site();

        assert_eq!(a, b);
        assert_eq!(a.name_file_line().2, b.name_file_line().2);
    }
}
