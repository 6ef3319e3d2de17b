/// SQL for the `memories` table
pub struct Queries;

impl Queries {
    pub const LIST_BY_JAR: &'static str = r#"
        SELECT id, jar_id, title, text, date, image_url, audio_url, tags, created_at
        FROM memories
        WHERE jar_id = $1
        ORDER BY created_at DESC, id DESC
    "#;

    pub const INSERT: &'static str = r#"
        INSERT INTO memories (jar_id, title, text, date, image_url, audio_url, tags)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, jar_id, title, text, date, image_url, audio_url, tags, created_at
    "#;

    pub const UPDATE: &'static str = r#"
        UPDATE memories
        SET title = $2, text = $3, date = $4, image_url = $5, audio_url = $6, tags = $7
        WHERE id = $1
        RETURNING id, jar_id, title, text, date, image_url, audio_url, tags, created_at
    "#;

    pub const DELETE: &'static str = "DELETE FROM memories WHERE id = $1 RETURNING jar_id";
}
