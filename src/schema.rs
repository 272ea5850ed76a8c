// Kept in sync by hand with repository::migrations::SCHEMA_SQL.

diesel::table! {
    listings (id) {
        id -> Text,
        title -> Text,
        company -> Text,
        url -> Text,
        company_url -> Nullable<Text>,
        location -> Nullable<Text>,
        description -> Nullable<Text>,
        tags -> Text,
        posted_date -> Nullable<Text>,
        status -> Text,
        enrich_attempts -> Integer,
        enrich_last_attempt_at -> Nullable<Text>,
        enrich_last_error -> Nullable<Text>,
        generate_attempts -> Integer,
        generate_last_attempt_at -> Nullable<Text>,
        generate_last_error -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    company_research (listing_id) {
        listing_id -> Text,
        company -> Text,
        summaries -> Text,
        website -> Nullable<Text>,
        created_at -> Text,
    }
}

diesel::table! {
    drafts (listing_id) {
        listing_id -> Text,
        body -> Text,
        notes -> Nullable<Text>,
        status -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::joinable!(company_research -> listings (listing_id));
diesel::joinable!(drafts -> listings (listing_id));

diesel::allow_tables_to_appear_in_same_query!(company_research, drafts, listings,);
