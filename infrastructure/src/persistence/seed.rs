use chrono::{TimeZone, Utc};
use domain::{Post, PostId};

/// Posts the in-memory store starts with, so a fresh server has something to list.
pub fn seed_posts() -> Vec<Post> {
    let seed = [
        (
            1,
            "Bem-vindo ao Diario",
            "Este é o primeiro post do sistema.",
            "Professor João",
            1,
        ),
        (
            2,
            "Segundo Post",
            "Conteúdo do segundo post sobre Node.js",
            "Professor Maria",
            2,
        ),
        (
            3,
            "Terceiro Post",
            "Express é um framework incrível",
            "Professor Pedro",
            3,
        ),
    ];

    seed.into_iter()
        .filter_map(|(id, title, content, author, day)| {
            Utc.with_ymd_and_hms(2026, 1, day, 0, 0, 0)
                .single()
                .map(|created_at| Post {
                    id: PostId::new(id),
                    title: title.to_string(),
                    content: content.to_string(),
                    author: author.to_string(),
                    created_at,
                })
        })
        .collect()
}
