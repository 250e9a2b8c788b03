diesel::table! {
    questionnaire_answers (id) {
        id -> Integer,
        user_id -> Text,
        question -> Text,
        value_json -> Text,
        updated_at -> BigInt,
    }
}
