/// The attribute fragments of `resolved` that do not appear in `requested`.
///
/// Both identities are split on `,` and every field is trimmed; fields of `resolved` without
/// an exact (case-sensitive) match among the fields of `requested` are kept in order and
/// joined with `", "`. Empty fields are ignored, so identical identities yield `""`.
///
/// ```
/// use dotprobe::probe::identity_difference;
///
/// assert_eq!(
///     identity_difference("Dep, Version=1.0.0.0, Culture=neutral", "Dep, Version=2.0.0.0, Culture=neutral"),
///     "Version=2.0.0.0"
/// );
/// ```
#[must_use]
pub fn identity_difference(requested: &str, resolved: &str) -> String {
    let requested: Vec<&str> = requested.split(',').map(str::trim).collect();

    resolved
        .split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty() && !requested.contains(field))
        .collect::<Vec<_>>()
        .join(", ")
}
