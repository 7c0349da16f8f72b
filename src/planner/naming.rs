//! Generated identifier construction.
//!
//! Every generated name is verified unique against the unit-wide identifier
//! inventory plus the names generated so far; collisions resolve by numeric
//! suffix.

use std::collections::HashSet;

/// `user_cache` / `userCache` / `user-cache` -> `UserCache`
pub fn pascal_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = true;
    for c in name.chars() {
        if c == '_' || c == '-' || c == '$' {
            upper_next = true;
            continue;
        }
        if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Reserve `candidate`, suffixing with 2, 3, ... until it is free in both
/// the unit inventory and the set of names generated so far
pub fn reserve(candidate: String, unit: &HashSet<String>, taken: &mut HashSet<String>) -> String {
    let mut name = candidate.clone();
    let mut counter = 2;
    while unit.contains(&name) || taken.contains(&name) {
        name = format!("{candidate}{counter}");
        counter += 1;
    }
    taken.insert(name.clone());
    name
}
