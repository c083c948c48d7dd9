//! Posts app: posts belong to a user; writes need a bearer token.

use viewset_sdk::{AppModule, Column, Field, Model, Relation, RequireBearer, Schema, View};

pub struct Posts;

impl AppModule for Posts {
    fn name(&self) -> &str {
        "posts"
    }

    fn models(&self) -> Vec<Model> {
        vec![Model::new("post")
            .column(Column::integer("id").primary_key())
            .column(Column::varchar("title", 200).not_null())
            .column(Column::text("body"))
            .column(Column::integer("author_id").not_null().index())
            .relation(Relation::many_to_one("author", "author_id", "user", "id"))]
    }

    fn views(&self) -> Vec<View> {
        vec![View::new("PostView", "post")
            .schema_in(
                Schema::new("PostIn")
                    .field(Field::string("title").max_length(200))
                    .field(Field::string("body").optional())
                    .field(Field::integer("author_id")),
            )
            .schema_out(
                Schema::new("PostOut")
                    .field(Field::integer("id"))
                    .field(Field::string("title"))
                    .field(Field::string("body").optional())
                    .field(Field::integer("author_id")),
            )
            .methods(["create", "get", "partial_update", "delete", "list"])
            .guard_for("create", RequireBearer)
            .guard_for("partial_update", RequireBearer)
            .guard_for("delete", RequireBearer)
            .tags(["posts", "content"])]
    }
}
