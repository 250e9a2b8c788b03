diesel::table! {
    profiles (id) {
        id -> Integer,
        user_id -> Text,
        email -> Text,
        preferred_name -> Nullable<Text>,
        zip_code -> Nullable<Text>,
        path_choice -> Nullable<Text>,
        onboarding_step -> Nullable<BigInt>,
        tier -> Text,
        created_at -> BigInt,
        updated_at -> BigInt,
    }
}
