use rand::Rng;

/// Uppercase letters without the visually confusable `I` and `O`.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";

/// Draw a room code of `length` characters, each picked uniformly from [`ROOM_CODE_ALPHABET`].
///
/// Uniqueness is not guaranteed; callers retry against storage on collision.
pub fn generate_room_code<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| char::from(ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())]))
        .collect()
}

/// Whether `code` could have been produced by [`generate_room_code`] with this length.
pub fn is_well_formed(code: &str, length: usize) -> bool {
    code.len() == length && code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b))
}
