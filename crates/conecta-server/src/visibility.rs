//! Visibility and authorization rules.
//!
//! Pure functions over the current user and full snapshots of the other
//! collections. Nothing here is cached: callers pass the latest snapshot and
//! get a fresh answer every time.

use conecta_protocol::{Channel, Role, SocialView, Task, Team, User};
use std::collections::HashSet;

/// Users the current user may see.
///
/// An Owner sees everyone. Anyone else sees themselves plus every member of
/// every team they belong to.
pub fn visible_users(current: &User, users: &[User], teams: &[Team]) -> Vec<User> {
    if current.is_owner() {
        return users.to_vec();
    }

    let mut ids: HashSet<&str> = HashSet::new();
    ids.insert(current.id.as_str());
    for team in teams.iter().filter(|t| t.has_member(&current.id)) {
        ids.insert(team.owner_id.as_str());
        ids.extend(team.members.iter().map(String::as_str));
    }

    let mut visible: Vec<User> = users
        .iter()
        .filter(|u| ids.contains(u.id.as_str()))
        .cloned()
        .collect();
    if !visible.iter().any(|u| u.id == current.id) {
        visible.insert(0, current.clone());
    }
    visible
}

/// Global channels plus the channels of teams the user belongs to.
pub fn visible_channels(current: &User, channels: &[Channel], teams: &[Team]) -> Vec<Channel> {
    let my_teams: HashSet<&str> = teams
        .iter()
        .filter(|t| t.has_member(&current.id))
        .map(|t| t.id.as_str())
        .collect();

    channels
        .iter()
        .filter(|c| match &c.team_id {
            None => true,
            Some(team_id) => my_teams.contains(team_id.as_str()),
        })
        .cloned()
        .collect()
}

/// "My tasks": every pending task for an Owner, otherwise the pending tasks
/// naming the user as responsible.
pub fn pending_tasks_for(current: &User, tasks: &[Task]) -> Vec<Task> {
    tasks
        .iter()
        .filter(|t| t.is_pending())
        .filter(|t| current.is_owner() || t.is_assigned_to(current))
        .cloned()
        .collect()
}

pub fn can_manage_tasks(user: &User) -> bool {
    user.is_owner()
}

pub fn can_complete_tasks(user: &User) -> bool {
    user.role == Role::Member
}

/// Only an Owner may toggle roles, and only on Member accounts.
pub fn can_toggle_role(actor: &User, target: &User) -> bool {
    actor.is_owner() && target.role == Role::Member
}

pub fn feed_enabled(user: &User) -> bool {
    !user.is_owner()
}

/// The pane actually shown for a requested view. Users without the feed are
/// sent to direct messages instead.
pub fn select_social_view(user: &User, requested: SocialView) -> SocialView {
    match requested {
        SocialView::Feed if !feed_enabled(user) => SocialView::Messages,
        other => other,
    }
}

/// Resolve responsible tokens to Member accounts.
///
/// `@Name` matches display names exactly (case-sensitive); a bare token is
/// taken as a user id. Owners never resolve. Each user appears at most once,
/// and tokens that match nobody are ignored.
pub fn resolve_responsible<'a>(tokens: &[String], users: &'a [User]) -> Vec<&'a User> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut resolved = Vec::new();

    for token in tokens {
        let token = token.trim();
        let matches = users.iter().filter(|u| u.role == Role::Member).filter(|u| {
            match token.strip_prefix('@') {
                Some(name) => u.name == name,
                None => u.id == token,
            }
        });
        for user in matches {
            if seen.insert(user.id.as_str()) {
                resolved.push(user);
            }
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use conecta_protocol::{TaskFields, TaskStatus};
    use uuid::Uuid;

    fn owner(id: &str, name: &str) -> User {
        User {
            role: Role::Owner,
            ..User::member(id, name, None)
        }
    }

    fn team(id: &str, owner_id: &str, members: &[&str]) -> Team {
        Team {
            id: id.into(),
            name: id.to_uppercase(),
            description: String::new(),
            owner_id: owner_id.into(),
            members: members.iter().map(|m| m.to_string()).collect(),
            created_at: Utc::now(),
            logo_url: None,
            theme_color: None,
        }
    }

    fn task(responsible: &[&str], status: TaskStatus) -> Task {
        Task {
            status,
            ..TaskFields {
                title: Some("t".into()),
                responsible: Some(responsible.iter().map(|r| r.to_string()).collect()),
                ..Default::default()
            }
            .into_task(Uuid::new_v4())
        }
    }

    fn ids(users: &[User]) -> Vec<&str> {
        users.iter().map(|u| u.id.as_str()).collect()
    }

    #[test]
    fn owner_sees_every_user() {
        let users = vec![
            owner("u1", "Ana"),
            User::member("u2", "Carlos", None),
            User::member("u3", "Luana", None),
        ];
        let visible = visible_users(&users[0], &users, &[]);
        assert_eq!(visible.len(), 3);
    }

    #[test]
    fn member_without_team_sees_only_self() {
        let users = vec![User::member("u2", "Carlos", None), User::member("u3", "Luana", None)];
        let visible = visible_users(&users[0], &users, &[]);
        assert_eq!(ids(&visible), ["u2"]);
    }

    #[test]
    fn member_sees_union_of_team_members() {
        let users = vec![
            owner("u1", "Ana"),
            User::member("u2", "Carlos", None),
            User::member("u3", "Luana", None),
            User::member("u4", "Mari", None),
            User::member("u5", "Zed", None),
        ];
        let teams = vec![
            team("t1", "u1", &["u1", "u2", "u3"]),
            team("t2", "u4", &["u4", "u2"]),
            team("t3", "u5", &["u5"]),
        ];
        let visible_list = visible_users(&users[1], &users, &teams);
        let mut visible = ids(&visible_list);
        visible.sort();
        assert_eq!(visible, ["u1", "u2", "u3", "u4"]);
    }

    #[test]
    fn joining_a_team_only_grows_visibility() {
        let users: Vec<User> = (1..=6)
            .map(|i| User::member(format!("u{i}"), format!("N{i}"), None))
            .collect();
        let me = &users[0];
        let mut teams = vec![team("t1", "u2", &["u2", "u1", "u3"]), team("t2", "u4", &["u4", "u5"])];

        let before: HashSet<String> = visible_users(me, &users, &teams)
            .into_iter()
            .map(|u| u.id)
            .collect();
        teams[1].members.push("u1".into());
        let after: HashSet<String> = visible_users(me, &users, &teams)
            .into_iter()
            .map(|u| u.id)
            .collect();

        assert!(before.contains("u1"));
        assert!(before.is_subset(&after));
        assert!(after.contains("u5"));
    }

    #[test]
    fn current_user_is_visible_even_without_profile() {
        let me = User::member("u9", "New", None);
        let visible = visible_users(&me, &[], &[]);
        assert_eq!(ids(&visible), ["u9"]);
    }

    #[test]
    fn team_channels_need_membership() {
        let me = User::member("u2", "Carlos", None);
        let channels = vec![
            Channel { id: "c1".into(), name: "#general".into(), team_id: None },
            Channel { id: "c2".into(), name: "#t-general".into(), team_id: Some("t1".into()) },
            Channel { id: "c3".into(), name: "#other".into(), team_id: Some("t2".into()) },
        ];
        let teams = vec![team("t1", "u1", &["u1", "u2"]), team("t2", "u1", &["u1"])];

        let visible: Vec<_> = visible_channels(&me, &channels, &teams)
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(visible, ["c1", "c2"]);
    }

    #[test]
    fn pending_tasks_follow_role() {
        let ana = owner("u1", "Ana");
        let alice = User::member("u2", "Alice", None);
        let bob = User::member("u3", "Bob", None);
        let tasks = vec![
            task(&["@Alice"], TaskStatus::Pending),
            task(&["@Bob"], TaskStatus::Completed),
            task(&["@alice"], TaskStatus::Pending),
        ];

        assert_eq!(pending_tasks_for(&ana, &tasks).len(), 2);
        assert_eq!(pending_tasks_for(&alice, &tasks).len(), 1);
        assert!(pending_tasks_for(&bob, &tasks).is_empty());
    }

    #[test]
    fn role_rules() {
        let ana = owner("u1", "Ana");
        let other_owner = owner("u5", "Bea");
        let carlos = User::member("u2", "Carlos", None);

        assert!(can_manage_tasks(&ana));
        assert!(!can_manage_tasks(&carlos));
        assert!(can_complete_tasks(&carlos));
        assert!(!can_complete_tasks(&ana));
        assert!(can_toggle_role(&ana, &carlos));
        assert!(!can_toggle_role(&ana, &other_owner));
        assert!(!can_toggle_role(&carlos, &ana));
    }

    #[test]
    fn owner_is_sent_away_from_the_feed() {
        let ana = owner("u1", "Ana");
        let carlos = User::member("u2", "Carlos", None);

        assert_eq!(select_social_view(&ana, SocialView::Feed), SocialView::Messages);
        assert_eq!(select_social_view(&ana, SocialView::Profile), SocialView::Profile);
        assert_eq!(select_social_view(&carlos, SocialView::Feed), SocialView::Feed);
    }

    #[test]
    fn responsible_resolution() {
        let users = vec![
            owner("u1", "Ana"),
            User::member("u2", "Alice", None),
            User::member("u3", "Bob", None),
        ];
        let tokens: Vec<String> = ["@Alice", "@alice", "@Ana", "u3", "@Alice", "@Nobody"]
            .iter()
            .map(|t| t.to_string())
            .collect();

        let resolved: Vec<_> = resolve_responsible(&tokens, &users)
            .into_iter()
            .map(|u| u.id.as_str())
            .collect();
        assert_eq!(resolved, ["u2", "u3"]);
    }
}
