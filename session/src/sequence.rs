/// Returns the circular distance from `trailing` up to `leading` on the
/// 8-bit sequence space.
///
/// `leading` is treated as ahead of (or equal to) `trailing`; the result
/// is how many increments `trailing` needs to reach `leading`. A result
/// of `0` means the two are equal — for a messenger, "everything sent
/// has been acknowledged".
///
/// # Examples
/// ```
/// # use tether_session::sequence_distance;
/// assert_eq!(sequence_distance(5, 3), 2);
/// assert_eq!(sequence_distance(3, 3), 0);
/// assert_eq!(sequence_distance(1, 250), 7);
/// ```
pub fn sequence_distance(leading: u8, trailing: u8) -> u8 {
    leading.wrapping_sub(trailing)
}
