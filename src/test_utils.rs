pub mod test_helpers {
    use std::sync::Arc;

    use crate::highlight::{
        OverlayRegion, OverlayStyle, OverlaySurface, PageFragmentSet, Rect, RequestId,
        TextFragment,
    };

    /// A single mutation applied to the overlay surface
    #[derive(Debug, Clone, PartialEq)]
    pub enum SurfaceOp {
        Draw(OverlayRegion),
        Erase(OverlayRegion),
    }

    /// Overlay surface that records every mutation and tracks what is visible
    #[derive(Debug, Default)]
    pub struct RecordingSurface {
        ops: Vec<SurfaceOp>,
        visible: Vec<OverlayRegion>,
    }

    impl RecordingSurface {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn ops(&self) -> &[SurfaceOp] {
            &self.ops
        }

        /// Regions currently painted, in draw order
        pub fn visible(&self) -> &[OverlayRegion] {
            &self.visible
        }

        /// All regions ever drawn
        pub fn draws(&self) -> Vec<OverlayRegion> {
            self.ops
                .iter()
                .filter_map(|op| match op {
                    SurfaceOp::Draw(region) => Some(*region),
                    SurfaceOp::Erase(_) => None,
                })
                .collect()
        }

        /// Number of mutations caused by `request`
        pub fn ops_for(&self, request: RequestId) -> usize {
            self.ops
                .iter()
                .filter(|op| match op {
                    SurfaceOp::Draw(region) | SurfaceOp::Erase(region) => {
                        region.request == request
                    }
                })
                .count()
        }
    }

    impl OverlaySurface for RecordingSurface {
        fn draw(&mut self, region: &OverlayRegion, _style: &OverlayStyle) {
            self.ops.push(SurfaceOp::Draw(*region));
            self.visible.push(*region);
        }

        fn erase(&mut self, region: &OverlayRegion) {
            self.ops.push(SurfaceOp::Erase(*region));
            self.visible.retain(|r| r != region);
        }
    }

    /// Builder for a page whose fragments sit left to right on lines
    pub struct PageBuilder {
        page: usize,
        origin: Rect,
        scale: f32,
        cursor_x: f32,
        line_y: f32,
        line_height: f32,
        fragments: Vec<TextFragment>,
    }

    impl PageBuilder {
        /// Start a page at the viewport origin, scale 1.0, 12px lines
        pub fn new(page: usize) -> Self {
            Self {
                page,
                origin: Rect::new(0.0, 0.0, 612.0, 792.0),
                scale: 1.0,
                cursor_x: 72.0,
                line_y: 72.0,
                line_height: 12.0,
                fragments: Vec::new(),
            }
        }

        pub fn origin(mut self, origin: Rect) -> Self {
            self.origin = origin;
            self
        }

        /// Render scale; applies to fragments appended afterwards
        pub fn scale(mut self, scale: f32) -> Self {
            self.scale = scale;
            self
        }

        /// Append a fragment of `width` unscaled px on the current line
        pub fn fragment(mut self, content: &str, width: f32) -> Self {
            let bounds = Rect::new(
                self.origin.x + self.cursor_x * self.scale,
                self.origin.y + self.line_y * self.scale,
                width * self.scale,
                self.line_height * self.scale,
            );
            self.fragments.push(TextFragment::new(content, bounds));
            self.cursor_x += width;
            self
        }

        /// Append fragments with a width proportional to their length
        pub fn fragments(mut self, contents: &[&str]) -> Self {
            for content in contents {
                let width = 6.0 * content.chars().count() as f32;
                self = self.fragment(content, width);
            }
            self
        }

        /// Move to the start of the next line
        pub fn newline(mut self) -> Self {
            self.cursor_x = 72.0;
            self.line_y += self.line_height + 2.0;
            self
        }

        pub fn build(self) -> Arc<PageFragmentSet> {
            Arc::new(PageFragmentSet::new(
                self.page,
                self.origin,
                self.scale,
                self.fragments,
            ))
        }
    }

}
