diesel::table! {
    life_plans (user_id) {
        user_id -> Text,
        current_version_id -> Nullable<Integer>,
        updated_at -> BigInt,
    }
}

diesel::table! {
    life_plan_versions (id) {
        id -> Integer,
        user_id -> Text,
        status -> Text,
        payload -> Nullable<Text>,
        error -> Nullable<Text>,
        created_at -> BigInt,
        updated_at -> BigInt,
    }
}

diesel::allow_tables_to_appear_in_same_query!(life_plans, life_plan_versions);
