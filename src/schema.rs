// Devpulse schema - commit activity tables for Diesel ORM

diesel::table! {
    teams (id) {
        id -> Integer,
        name -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    developers (id) {
        id -> Integer,
        name -> Text,
        email -> Nullable<Text>,
        team_id -> Nullable<Integer>,
        created_at -> Text,
    }
}

diesel::table! {
    developer_teams (developer_id, team_id) {
        developer_id -> Integer,
        team_id -> Integer,
        created_at -> Text,
    }
}

diesel::table! {
    commits (id) {
        id -> Integer,
        commit_id -> Text,
        message -> Text,
        developer_id -> Nullable<Integer>,
        team_id -> Nullable<Integer>,
        commit_type -> Nullable<Text>,
        evaluation_total -> Nullable<Double>,
        evaluation_complexity -> Nullable<Double>,
        evaluation_volume -> Nullable<Double>,
        evaluation_thinking -> Nullable<Double>,
        evaluation_others -> Nullable<Double>,
        comment -> Nullable<Text>,
        lines_added -> Integer,
        lines_deleted -> Integer,
        work_hours -> Nullable<Double>,
        ai_driven_minutes -> Nullable<Integer>,
        productivity -> Nullable<Double>,
        agent_hash -> Nullable<Text>,
        created_at -> Text,
    }
}

diesel::joinable!(commits -> developers (developer_id));
diesel::joinable!(commits -> teams (team_id));

diesel::allow_tables_to_appear_in_same_query!(teams, developers, developer_teams, commits);
