use std::collections::{BTreeMap, HashSet};

use pact_core::{FriendEdge, User};

/// Candidate partners for a new contract, split by friendship.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartnerChoices {
    pub friends: Vec<User>,
    pub others: Vec<User>,
}

/// Splits `users` into the actor's friends and everyone else. The actor is
/// never offered as their own partner.
pub fn partition_users(users: &[User], edges: &[FriendEdge], actor_id: &str) -> PartnerChoices {
    let friend_ids: HashSet<&str> = edges
        .iter()
        .filter(|edge| edge.user_id == actor_id)
        .map(|edge| edge.friend_id.as_str())
        .collect();

    let (friends, others): (Vec<User>, Vec<User>) = users
        .iter()
        .filter(|user| user.id != actor_id)
        .cloned()
        .partition(|user| friend_ids.contains(user.id.as_str()));

    PartnerChoices { friends, others }
}

/// Groups users under the uppercased first letter of their name. Names that
/// do not start with a letter go under `#`. Each group is sorted by name.
pub fn group_alphabetically(users: &[User]) -> BTreeMap<char, Vec<User>> {
    let mut groups: BTreeMap<char, Vec<User>> = BTreeMap::new();
    for user in users {
        let key = match user.name.trim_start().chars().next() {
            Some(first) if first.is_alphabetic() => first.to_uppercase().next().unwrap_or(first),
            _ => '#',
        };
        groups.entry(key).or_default().push(user.clone());
    }

    for members in groups.values_mut() {
        members.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
    }
    groups
}
