//! Demo workspace written into an empty store.

use crate::store::{DocumentStore, Entity, Query, Result, WriteOp};
use conecta_protocol::{Channel, Role, Task, TaskStatus, User};
use uuid::Uuid;

// (id, name, role, points, job title, bio, location, followers, following)
const DEFAULT_PROFILES: [(&str, &str, Role, u32, &str, &str, &str, u32, u32); 4] = [
    (
        "u1",
        "Ana",
        Role::Owner,
        0,
        "CEO & Founder",
        "Leading innovation at Conecta. Passionate about technology and people.",
        "São Paulo, SP",
        1250,
        300,
    ),
    (
        "u2",
        "Carlos",
        Role::Member,
        80,
        "Senior Developer",
        "Fullstack developer, always chasing clean code.",
        "Remote",
        450,
        120,
    ),
    (
        "u3",
        "Luana",
        Role::Member,
        120,
        "UX/UI Designer",
        "Crafting digital experiences with a focus on accessibility.",
        "Rio de Janeiro, RJ",
        890,
        400,
    ),
    (
        "u4",
        "Mari",
        Role::Member,
        50,
        "Marketing Manager",
        "Growth and data-driven marketing.",
        "Curitiba, PR",
        600,
        500,
    ),
];

pub fn default_users() -> Vec<User> {
    DEFAULT_PROFILES
        .iter()
        .map(
            |&(id, name, role, points, job_title, bio, location, followers, following)| User {
                role,
                points,
                job_title: Some(job_title.to_string()),
                bio: Some(bio.to_string()),
                location: Some(location.to_string()),
                followers: Some(followers),
                following: Some(following),
                ..User::member(id, name, Some(format!("{}@conecta.com", name.to_lowercase())))
            },
        )
        .collect()
}

pub fn default_channels() -> Vec<Channel> {
    [("c1", "#general"), ("c2", "#projects"), ("c3", "#marketing")]
        .into_iter()
        .map(|(id, name)| Channel {
            id: id.to_string(),
            name: name.to_string(),
            team_id: None,
        })
        .collect()
}

pub fn default_tasks() -> Vec<Task> {
    vec![
        Task {
            id: Uuid::new_v4(),
            title: "Review the new app design".to_string(),
            description: "Go through the prototype and leave feedback".to_string(),
            channel: "#projects".to_string(),
            responsible: vec!["@Luana".to_string()],
            points: 30,
            deadline: Some("25/12/2024".to_string()),
            status: TaskStatus::Pending,
        },
        Task {
            id: Uuid::new_v4(),
            title: "Prepare the Q4 sales report".to_string(),
            description: "Compile the sales figures of the last quarter".to_string(),
            channel: "#general".to_string(),
            responsible: vec!["@Carlos".to_string()],
            points: 50,
            deadline: Some("28/12/2024".to_string()),
            status: TaskStatus::Pending,
        },
    ]
}

fn set_op<T: Entity>(entity: &T) -> Result<WriteOp> {
    Ok(WriteOp::Set {
        collection: T::COLLECTION.to_string(),
        id: entity.document_id(),
        fields: entity.to_fields()?,
    })
}

/// Seed users, channels and tasks when the users collection is empty.
/// Returns whether anything was written.
pub async fn seed_if_empty(store: &dyn DocumentStore) -> Result<bool> {
    let users = store.query(&Query::collection(User::COLLECTION)).await?;
    if !users.is_empty() {
        return Ok(false);
    }

    tracing::info!("Seeding database...");
    let mut batch = Vec::new();
    for user in default_users() {
        batch.push(set_op(&user)?);
    }
    for channel in default_channels() {
        batch.push(set_op(&channel)?);
    }
    for task in default_tasks() {
        batch.push(set_op(&task)?);
    }
    for chunk in batch.chunks(store.max_batch_size().max(1)) {
        store.commit(chunk.to_vec()).await?;
    }

    Ok(true)
}
