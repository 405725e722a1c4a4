/// Deterministic color assignment for clusters: no client-facing meaning
/// beyond giving the UI a stable, distinct swatch per cluster. Cycles once
/// a rebuild produces more clusters than colors.
const PALETTE: &[&str] = &[
    "#4C6EF5", "#F76707", "#2F9E44", "#E64980", "#7048E8", "#12B886", "#FAB005", "#1098AD", "#E8590C", "#5C7CFA",
];

pub fn color_for(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}
